//! Logging initialization
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` overrides the default filter.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process
///
/// Safe to call multiple times (subsequent calls are no-ops).
///
/// # Arguments
///
/// * `verbose` - Default to debug level instead of info when `RUST_LOG` is unset
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wallet_ledger={}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
