//! The append-only file log sink.
//!
//! Call sites use the ordinary `log` facade (`log::info!`, ...) and build
//! their own `"<id>: "`-prefixed line; this module only owns the open file
//! and serializes writes to it behind one mutex. That single global mutex
//! is a known bottleneck at high log rates — acceptable here, since this
//! proxy only logs one line per state transition, not per byte.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use log::{Log, Metadata, Record, SetLoggerError};

/// Prefix used for events that happen before any session exists
/// (listener bind failures, accept errors, shutdown notices).
pub const NO_ID: &str = "(no id)";

struct FileLogger {
    file: Mutex<File>,
}

impl Log for FileLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut file = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(file, "{}", record.args());
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

/// Opens (truncating) the log file at `path` and installs it as the
/// global `log` backend. Must be called once, before the listener binds.
pub fn init(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    let logger = FileLogger { file: Mutex::new(file) };
    install(logger).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

fn install(logger: FileLogger) -> Result<(), SetLoggerError> {
    log::set_max_level(log::LevelFilter::Info);
    log::set_boxed_logger(Box::new(logger))
}

/// Renders the `"<id>: "` prefix a session (or `NO_ID`) attaches to every
/// line it logs.
pub fn id_prefix(id: u64) -> String {
    format!("{id}: ")
}
