//! The per-connection state machine (§4.2).
//!
//! Each [`Session`] owns one accepted client socket and runs entirely on
//! the task it was spawned on. Every socket operation is a plain
//! sequential `.await`; because a tokio task is never polled concurrently
//! with itself, that is already the serialization the original's
//! `io_context::strand` existed to provide, so nothing extra is threaded
//! through here.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheEntry, CachePolicy, ResponseCache};
use crate::error::{Result, SessionError};
use crate::http::{self, Method, Request, Response, Version};
use crate::logging;
use crate::time_util;

const TUNNEL_BUF_SIZE: usize = 8192;

/// Owns one client connection end to end.
pub struct Session {
    id: u64,
    client: TcpStream,
    client_addr: SocketAddr,
    cache: Arc<ResponseCache>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(
        id: u64,
        client: TcpStream,
        client_addr: SocketAddr,
        cache: Arc<ResponseCache>,
        cancel: CancellationToken,
    ) -> Self {
        Session { id, client, client_addr, cache, cancel }
    }

    fn prefix(&self) -> String {
        logging::id_prefix(self.id)
    }

    /// Drives the session until the client connection closes, in either
    /// direction, for any reason. Never returns an error: every failure
    /// is logged (or silently absorbed, for an ordinary hangup) here.
    pub async fn run(mut self) {
        loop {
            let request = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = http::read_request(&mut self.client) => result,
            };

            let request = match request {
                Ok(Some(req)) => req,
                Ok(None) => return,
                Err(e) => {
                    let err = SessionError::from_initial_read_io(e);
                    if err.should_log() {
                        error!("{}Error [await_initial_request]: {err}", self.prefix());
                    }
                    if matches!(err, SessionError::BadRequest(_)) {
                        let _ = self.reply_bad_request().await;
                    }
                    return;
                }
            };

            self.log_initial_request(&request);

            if !request.method.is_supported() {
                error!(
                    "{}Error [validate_method]: unsupported method {}",
                    self.prefix(),
                    request.method
                );
                return;
            }

            let keep_going = match self.dispatch(request).await {
                Ok(keep_going) => keep_going,
                Err(e) => {
                    if e.should_log() {
                        error!("{}Error [dispatch]: {e}", self.prefix());
                    }
                    if matches!(e, SessionError::BadRequest(_)) {
                        let _ = self.reply_bad_request().await;
                    }
                    false
                }
            };

            if !keep_going {
                return;
            }
        }
    }

    fn log_initial_request(&self, request: &Request) {
        info!(
            "{}{} {} HTTP/{} from {} @ {}",
            self.prefix(),
            request.method,
            request.target,
            request.version,
            self.client_addr.ip(),
            time_util::format_gmt(time_util::now_utc()),
        );
    }

    /// Routes into the right submachine. A fresh cache hit is served
    /// without ever resolving or connecting to an origin, per §8's
    /// freshness invariant ("the proxy must serve from cache without
    /// contacting origin"); every other path resolves and connects only
    /// once it actually needs to reach one.
    async fn dispatch(&mut self, request: Request) -> Result<bool> {
        match request.method.clone() {
            Method::Get => self.dispatch_get(request).await,
            Method::Connect => {
                let origin = self.connect_origin(&request).await?;
                self.run_https_tunnel(origin).await?;
                Ok(false)
            }
            Method::Post => {
                let origin = self.connect_origin(&request).await?;
                self.run_http_forward(origin, request).await
            }
            Method::Other(_) => unreachable!("unsupported methods are rejected before dispatch"),
        }
    }

    /// Resolves `request`'s origin endpoint and connects to it.
    async fn connect_origin(&self, request: &Request) -> Result<TcpStream> {
        let (host, port) = request
            .origin_endpoint()
            .ok_or_else(|| SessionError::BadRequest("missing Host header".into()))?;

        let mut addrs = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(SessionError::DnsFailure)?;
        let addr = addrs
            .next()
            .ok_or_else(|| SessionError::DnsFailure(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no addresses for {host}"),
            )))?;

        TcpStream::connect(addr).await.map_err(SessionError::ConnectFailure)
    }

    async fn run_https_tunnel(&mut self, mut origin: TcpStream) -> Result<()> {
        let established = Response::tunnel_established(Version::Http11);
        http::write_response(&mut self.client, &established)
            .await
            .map_err(SessionError::from_io)?;

        let (mut client_read, mut client_write) = self.client.split();
        let (mut origin_read, mut origin_write) = origin.split();

        let client_to_server = Self::pump(&mut client_read, &mut origin_write);
        let server_to_client = Self::pump(&mut origin_read, &mut client_write);

        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = client_to_server => {}
            _ = server_to_client => {}
        }

        info!("{}Tunnel closed", self.prefix());
        Ok(())
    }

    /// One half-duplex direction of a tunnel: read whatever is available,
    /// write it all through, repeat until EOF or error.
    async fn pump<R, W>(read_half: &mut R, write_half: &mut W)
    where
        R: tokio::io::AsyncRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin,
    {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut buf = vec![0u8; TUNNEL_BUF_SIZE];
        loop {
            let n = match read_half.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            if write_half.write_all(&buf[..n]).await.is_err() {
                return;
            }
        }
    }

    /// Plain forward: send the request unchanged, read the response,
    /// store it in cache if this was a GET, relay it to the client.
    async fn run_http_forward(&mut self, mut origin: TcpStream, request: Request) -> Result<bool> {
        self.send_to_origin(&mut origin, &request).await?;
        let response = match self.receive_from_origin(&mut origin, &request).await {
            Ok(resp) => resp,
            Err(SessionError::PeerClosed) => return Err(SessionError::PeerClosed),
            Err(e) => {
                self.reply_bad_request().await?;
                return Err(e);
            }
        };

        if request.method == Method::Get {
            self.maybe_cache(&request, &response);
        }

        self.reply(&response).await?;
        Ok(!response.connection_close())
    }

    /// `CacheLookup` (§4.2). A fresh hit replies straight from cache and
    /// never opens a connection to the origin; a miss or stale hit
    /// resolves and connects only at that point, not before.
    async fn dispatch_get(&mut self, request: Request) -> Result<bool> {
        let cached = self.cache.get(&request.target);
        let Some(entry) = cached else {
            info!("{}not in cache", self.prefix());
            let origin = self.connect_origin(&request).await?;
            return self.run_http_forward(origin, request).await;
        };

        if !CachePolicy::needs_revalidation(&entry) {
            info!("{}in cache, valid", self.prefix());
            self.reply(&entry.response).await?;
            return Ok(true);
        }

        if let Some(cc) = entry.response.cache_control() {
            if cc.to_ascii_lowercase().contains("no-cache") {
                info!("{}in cache, requires validation", self.prefix());
            }
        }
        if time_util::now_utc() > entry.expiry {
            info!(
                "{}in cache, but expired at {}",
                self.prefix(),
                time_util::format_gmt(entry.expiry)
            );
        }

        let origin = self.connect_origin(&request).await?;
        self.revalidate(origin, request, entry).await
    }

    async fn revalidate(
        &mut self,
        mut origin: TcpStream,
        request: Request,
        entry: CacheEntry,
    ) -> Result<bool> {
        let conditional = CachePolicy::build_conditional_request(&request, &entry.response);
        self.send_to_origin(&mut origin, &conditional).await?;
        let response = match self.receive_from_origin(&mut origin, &conditional).await {
            Ok(resp) => resp,
            Err(SessionError::PeerClosed) => return Err(SessionError::PeerClosed),
            Err(e) => {
                self.reply_bad_request().await?;
                return Err(e);
            }
        };

        match response.status {
            304 => {
                self.reply(&entry.response).await?;
                Ok(true)
            }
            200 => {
                self.maybe_cache(&request, &response);
                self.reply(&response).await?;
                Ok(!response.connection_close())
            }
            _ => {
                self.reply(&response).await?;
                Ok(!response.connection_close())
            }
        }
    }

    fn maybe_cache(&mut self, request: &Request, response: &Response) {
        match CachePolicy::classify(response) {
            Ok(expiry) => {
                info!("{}NOTE cache the response", self.prefix());
                let entry = CacheEntry { response: response.clone(), expiry };
                let (_, evicted) = self.cache.store(request.target.clone(), entry);
                if let Some(key) = evicted {
                    info!("{}NOTE evicted {key}", self.prefix());
                }
            }
            Err(reason) => {
                info!("{}not cacheable because {}", self.prefix(), reason.as_str());
            }
        }
    }

    async fn send_to_origin(&mut self, origin: &mut TcpStream, request: &Request) -> Result<()> {
        let host = request.host().unwrap_or("");
        info!(
            "{}Requesting {} {} HTTP/{} from {host}",
            self.prefix(),
            request.method,
            request.target,
            request.version,
        );
        http::write_request(origin, request).await.map_err(SessionError::from_io)
    }

    async fn receive_from_origin(&mut self, origin: &mut TcpStream, request: &Request) -> Result<Response> {
        let response = http::read_response(origin).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                SessionError::PeerClosed
            } else {
                SessionError::UpstreamParseFailure(e.to_string())
            }
        })?;
        info!(
            "{}Received HTTP/{} {} from {}",
            self.prefix(),
            response.version,
            response.status,
            request.host().unwrap_or("")
        );
        Ok(response)
    }

    async fn reply(&mut self, response: &Response) -> Result<()> {
        info!(
            "{}Responding HTTP/{} {}",
            self.prefix(),
            response.version,
            response.status
        );
        http::write_response(&mut self.client, response).await.map_err(SessionError::from_io)
    }

    async fn reply_bad_request(&mut self) -> Result<()> {
        let response = Response::empty(400, Version::Http11);
        self.reply(&response).await
    }
}
