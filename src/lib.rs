#![forbid(unsafe_code)]
#![deny(nonstandard_style)]
//! A caching forward HTTP proxy.
//!
//! Terminates client connections, forwards `GET`/`POST` requests to
//! origin servers, tunnels `CONNECT` (HTTPS) as opaque bytes, and caches
//! `GET` responses under a conservative subset of HTTP cache-control
//! semantics (`no-cache`, `no-store`, `private`, `max-age`, `s-maxage`,
//! `Expires`, `ETag`, `Last-Modified`).
//!
//! The pieces, leaves first:
//!
//! - [`cache`]: the bounded LRU store and its freshness/cacheability rules.
//! - [`http`]: the request/response model and `httparse`-based wire framing.
//! - [`proxy`]: the per-connection session state machine, the accept loop,
//!   and the shared multi-thread runtime.
//! - [`config`], [`error`], [`logging`], [`time_util`]: the ambient
//!   plumbing everything above is built on.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod proxy;
pub mod time_util;

pub use config::ProxyConfig;
pub use proxy::Runtime;
