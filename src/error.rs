use thiserror::Error;

/// A `Result` typedef for code within a single proxy session.
pub type Result<T> = std::result::Result<T, SessionError>;

/// The session-local error taxonomy.
///
/// Every variant here maps directly to a row in the error handling table:
/// a `SessionError` is always recovered inside [`crate::proxy::Session`]
/// (logged, turned into a synthesized response, or just a quiet close) and
/// never propagates past `Session::run`.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The client's request could not be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request method was not one of GET, POST, CONNECT.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// Resolving the origin host failed.
    #[error("dns resolution failed: {0}")]
    DnsFailure(#[source] std::io::Error),

    /// Connecting to the resolved origin address failed.
    #[error("connect failed: {0}")]
    ConnectFailure(#[source] std::io::Error),

    /// The upstream response could not be parsed.
    #[error("upstream parse failure: {0}")]
    UpstreamParseFailure(String),

    /// The peer closed its side of the connection (EOF).
    #[error("peer closed connection")]
    PeerClosed,

    /// The peer reset the connection.
    #[error("peer reset connection")]
    PeerReset,

    /// Any other socket-level failure.
    #[error("transport error: {0}")]
    TransportError(#[source] std::io::Error),
}

impl SessionError {
    /// Classifies a raw I/O error the way the error table expects: EOF and
    /// reset are quiet closes, everything else is a logged transport error.
    pub fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => SessionError::PeerReset,
            std::io::ErrorKind::UnexpectedEof => SessionError::PeerClosed,
            _ => SessionError::TransportError(err),
        }
    }

    /// Classifies the error from reading a client's initial request line.
    ///
    /// Distinct from [`SessionError::from_io`]: `wire::read_request` marks a
    /// malformed request with [`std::io::ErrorKind::InvalidData`], and that
    /// case is a `BadRequest` here, not a `TransportError` — the error table
    /// (§7) calls for synthesizing and sending a 400, not just logging.
    pub fn from_initial_read_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::InvalidData => SessionError::BadRequest(err.to_string()),
            _ => SessionError::from_io(err),
        }
    }

    /// Whether this error should be logged before closing.
    ///
    /// `PeerClosed` and `PeerReset` are ordinary hangups, not failures.
    pub fn should_log(&self) -> bool {
        !matches!(self, SessionError::PeerClosed | SessionError::PeerReset)
    }
}
