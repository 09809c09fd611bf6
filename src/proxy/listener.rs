//! The accept loop (§4.4).
//!
//! `Listener` does nothing but accept and dispatch: it owns the bound
//! socket and a monotonically increasing connection id, and hands every
//! accepted client off to a freshly spawned [`Session`] on the shared
//! runtime. No session logic lives here.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};
use socket2::{Domain, Socket, Type};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::cache::ResponseCache;
use crate::logging::NO_ID;
use crate::proxy::session::Session;

pub struct Listener {
    inner: TcpListener,
    cache: Arc<ResponseCache>,
    cancel: CancellationToken,
    next_id: u64,
}

impl Listener {
    /// Binds `addr` with `SO_REUSEADDR` set before `bind()`, matching the
    /// original acceptor's `reuse_address(true)` option.
    pub fn bind(addr: SocketAddr, cache: Arc<ResponseCache>, cancel: CancellationToken) -> io::Result<Self> {
        let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket::new(domain, Type::STREAM, None)?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(1024)?;

        let inner = TcpListener::from_std(socket.into())?;
        Ok(Listener { inner, cache, cancel, next_id: 0 })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Runs the accept loop until cancellation fires. In-flight sessions
    /// are not aborted — they keep running on the shared runtime after
    /// this loop returns.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("{NO_ID}listener shutting down");
                    return;
                }
                accepted = self.inner.accept() => {
                    match accepted {
                        Ok((socket, peer_addr)) => self.dispatch(socket, peer_addr),
                        Err(e) => error!("{NO_ID}Error [accept]: {e}"),
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, socket: tokio::net::TcpStream, peer_addr: SocketAddr) {
        let id = self.next_id;
        self.next_id += 1;
        let session = Session::new(id, socket, peer_addr, Arc::clone(&self.cache), self.cancel.clone());
        tokio::spawn(session.run());
    }
}
