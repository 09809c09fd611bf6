//! The shared I/O executor (§4.5).
//!
//! One `Runtime` per process: builds the multi-thread `tokio` scheduler,
//! owns the cache singleton behind an `Arc`, installs the log sink, and
//! turns SIGINT/SIGTERM/SIGHUP into an orderly shutdown signal shared with
//! every session through a [`CancellationToken`].

use std::io;
use std::sync::Arc;

use log::info;
use tokio::runtime::Runtime as TokioRuntime;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::cache::ResponseCache;
use crate::config::ProxyConfig;
use crate::logging::{self, NO_ID};
use crate::proxy::listener::Listener;

pub struct Runtime {
    tokio_rt: TokioRuntime,
    cache: Arc<ResponseCache>,
    cancel: CancellationToken,
    config: ProxyConfig,
}

impl Runtime {
    /// Installs the log sink, builds the worker pool, and constructs the
    /// shared cache. Does not bind the listener yet — see [`Runtime::run`].
    pub fn new(config: ProxyConfig) -> io::Result<Self> {
        logging::init(&config.log_path)?;

        let tokio_rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.workers.max(1))
            .enable_all()
            .build()?;

        let cache = Arc::new(ResponseCache::new(config.cache_capacity));
        let cancel = CancellationToken::new();

        Ok(Runtime { tokio_rt, cache, cancel, config })
    }

    /// Binds the listener, installs the signal handlers, and blocks until
    /// shutdown is requested.
    pub fn run(self) -> io::Result<()> {
        let listener = Listener::bind(self.config.address, Arc::clone(&self.cache), self.cancel.clone())?;
        let bound = listener.local_addr()?;
        info!("{NO_ID}Server start, listening on {bound}");

        let cancel_for_signals = self.cancel.clone();
        self.tokio_rt.block_on(async move {
            tokio::spawn(watch_shutdown_signals(cancel_for_signals));
            listener.run().await;
        });

        info!("{NO_ID}Server stopped");
        Ok(())
    }

    /// Exposes the cancellation token so an embedding test harness can
    /// trigger shutdown without sending a real signal.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

async fn watch_shutdown_signals(cancel: CancellationToken) {
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{NO_ID}Error [signal interrupt]: {e}");
            return;
        }
    };
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{NO_ID}Error [signal terminate]: {e}");
            return;
        }
    };
    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{NO_ID}Error [signal hangup]: {e}");
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => info!("{NO_ID}received SIGINT"),
        _ = sigterm.recv() => info!("{NO_ID}received SIGTERM"),
        _ = sighup.recv() => info!("{NO_ID}received SIGHUP"),
    }
    cancel.cancel();
}
