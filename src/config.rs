//! Compile-time-constant configuration record.
//!
//! There is no CLI or file-based configuration surface in this version
//! (daemonization, argument parsing, and syslog wiring are external
//! collaborator concerns). [`ProxyConfig`] exists so that the handful of
//! knobs the core cares about — bind address, worker count, cache
//! capacity, log path — are named fields instead of scattered literals,
//! and so tests can override them without touching global state.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime-wide configuration for a single proxy instance.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address the [`crate::proxy::Listener`] binds.
    pub address: SocketAddr,
    /// Number of worker threads in the shared I/O pool.
    pub workers: usize,
    /// Maximum number of entries the response cache holds.
    pub cache_capacity: usize,
    /// Path of the append-only log file, truncated at startup.
    pub log_path: PathBuf,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:12345".parse().expect("valid default address"),
            workers: 4,
            cache_capacity: 4,
            log_path: PathBuf::from("logs/proxy.log"),
        }
    }
}
