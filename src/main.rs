//! Binary entrypoint: build the default [`ProxyConfig`], stand up the
//! [`Runtime`], and run until a shutdown signal arrives.
//!
//! Daemonization, privilege dropping, and CLI parsing are external
//! collaborator concerns this binary does not perform itself; it expects
//! to be launched already under whatever supervisor handles those.

use cachecrab::{ProxyConfig, Runtime};

fn main() -> std::process::ExitCode {
    let config = ProxyConfig::default();

    let runtime = match Runtime::new(config) {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    match runtime.run() {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("proxy exited with error: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
