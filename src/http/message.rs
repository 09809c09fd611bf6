//! The request/response data model (§3 of the spec).
//!
//! Headers are kept in an [`http::HeaderMap`] so lookups stay
//! case-insensitive without any extra bookkeeping on our part; bodies are
//! plain buffers since streaming responses are out of scope.

use std::fmt;

use http::HeaderMap;

/// The HTTP method of an inbound request.
///
/// Only `GET`, `POST`, and `CONNECT` are ever acted on; anything else is
/// carried as `Other` purely so it can be logged before the session
/// rejects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Connect,
    Other(String),
}

impl Method {
    pub fn parse(raw: &str) -> Method {
        match raw {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "CONNECT" => Method::Connect,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Connect => "CONNECT",
            Method::Other(s) => s.as_str(),
        }
    }

    /// Whether this method is one the session will actually drive to an
    /// origin, per §4.2's `ValidateMethod` transition.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Method::Other(_))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The HTTP version on a request or response line. HTTP/2+ is never
/// produced by this proxy; it only speaks 1.0 and 1.1 upstream and down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn from_minor(minor: u8) -> Version {
        if minor >= 1 {
            Version::Http11
        } else {
            Version::Http10
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Http10 => f.write_str("1.0"),
            Version::Http11 => f.write_str("1.1"),
        }
    }
}

/// A parsed HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// The `Host` header, with any trailing `:port` stripped. For display
    /// only (log lines); [`Request::origin_endpoint`] is what dispatch
    /// actually connects with.
    pub fn host(&self) -> Option<&str> {
        let raw = self.headers.get(http::header::HOST)?.to_str().ok()?;
        Some(match raw.rfind(':') {
            Some(idx) => &raw[..idx],
            None => raw,
        })
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Host and port the proxy should connect to at the origin.
    ///
    /// `CONNECT`'s authority lives in the request-target itself
    /// (`host:port`), not necessarily in a `Host` header — the spec's own
    /// literal tunnel example (`CONNECT host:443 HTTP/1.1`) carries no
    /// `Host` header at all. `GET`/`POST` take it from `Host`, honoring an
    /// explicit `:port` there rather than assuming 80.
    pub fn origin_endpoint(&self) -> Option<(String, u16)> {
        if self.method == Method::Connect {
            return split_host_port(&self.target, 443);
        }
        let raw = self.headers.get(http::header::HOST)?.to_str().ok()?;
        split_host_port(raw, 80)
    }
}

fn split_host_port(raw: &str, default_port: u16) -> Option<(String, u16)> {
    match raw.rfind(':') {
        Some(idx) => {
            let host = &raw[..idx];
            let port = raw[idx + 1..].parse().ok()?;
            Some((host.to_string(), port))
        }
        None => Some((raw.to_string(), default_port)),
    }
}

/// A parsed HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Reason phrase to render on the wire. `None` falls back to the
    /// status code's canonical reason (e.g. `OK` for 200); responses the
    /// proxy parsed off the wire never set this, since their original
    /// phrase is discarded during framing and reconstructing it exactly
    /// is not worth the bytes. Responses the proxy *synthesizes* — the
    /// tunnel's `200 Connection Established` in particular — set it
    /// explicitly so the literal text in §6's log/wire catalog is what a
    /// client actually sees.
    pub reason: Option<&'static str>,
}

impl Response {
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.header_str(http::header::CACHE_CONTROL.as_str())
    }

    /// Whether the response declared `Connection: close`, which ends the
    /// HTTP forward loop's keep-alive re-read (§9).
    pub fn connection_close(&self) -> bool {
        self.header_str(http::header::CONNECTION.as_str())
            .map(|v| v.eq_ignore_ascii_case("close"))
            .unwrap_or(false)
    }

    /// Builds an empty-body response with only a status code, used for
    /// the synthesized `400 Bad Request` reply.
    pub fn empty(status: u16, version: Version) -> Response {
        Response { status, version, headers: HeaderMap::new(), body: Vec::new(), reason: None }
    }

    /// The `200 Connection Established` reply a `CONNECT` tunnel opens
    /// with (§4.2's `HttpsTunnel::Send200`).
    pub fn tunnel_established(version: Version) -> Response {
        Response {
            status: 200,
            version,
            headers: HeaderMap::new(),
            body: Vec::new(),
            reason: Some("Connection Established"),
        }
    }
}
