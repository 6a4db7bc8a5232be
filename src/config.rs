//! Ledger configuration
//!
//! Runtime settings for stores and the engine. The CLI builds a
//! [`LedgerConfig`] from its arguments (which may come from the environment);
//! library users construct one directly or take the defaults.

use std::path::PathBuf;
use std::time::Duration;

/// How long a store call waits for a busy wallet before giving up
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of records returned by a transaction listing
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Store and engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Upper bound on waiting for a wallet lock
    pub lock_timeout: Duration,

    /// Journal file for durable storage; `None` keeps everything in memory
    pub journal: Option<PathBuf>,

    /// Fsync the journal after every write
    pub sync_writes: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            journal: None,
            sync_writes: false,
        }
    }
}

impl LedgerConfig {
    /// Build a config, falling back to the default timeout when given zero
    pub fn new(lock_timeout: Duration, journal: Option<PathBuf>, sync_writes: bool) -> Self {
        let lock_timeout = if lock_timeout.is_zero() {
            tracing::warn!(
                default_ms = DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
                "lock timeout of 0ms is not usable, using default"
            );
            DEFAULT_LOCK_TIMEOUT
        } else {
            lock_timeout
        };

        Self {
            lock_timeout,
            journal,
            sync_writes,
        }
    }
}
