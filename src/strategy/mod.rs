//! Processing strategy module for batch operation files
//!
//! This module defines the Strategy pattern for complete batch pipelines,
//! encompassing CSV parsing, applying operations through the ledger engine and
//! writing wallet summaries. Different implementations (synchronous,
//! asynchronous batch) can be selected at runtime.

use crate::cli::StrategyType;
use crate::core::{LedgerStore, QueryService, WalletRegistry};
use crate::io::WalletSummary;
use crate::types::{LedgerError, LedgerOperation};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete batch pipelines
///
/// Each strategy reads operations from a CSV file, applies them to its store
/// and writes the final state of every labelled wallet to output.
pub trait ProcessingStrategy: Send + Sync {
    /// Apply the operations in `input_path` and write wallet summaries
    ///
    /// # Arguments
    ///
    /// * `input_path` - Operations CSV (`op,wallet,name,amount,description`)
    /// * `output` - Writer receiving `wallet,name,balance,transactions` rows
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened
    /// - The runtime cannot be started (async strategy)
    /// - Output cannot be written
    ///
    /// Rows that fail to parse or apply are logged and skipped; they do not
    /// cause this method to return an error.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LedgerError>;
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of processing strategy to create (Sync or Async)
/// * `store` - Store the operations are applied to
/// * `config` - Optional configuration for async batch processing (ignored for sync)
pub fn create_strategy<S: LedgerStore + 'static>(
    strategy_type: StrategyType,
    store: Arc<S>,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(store)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(store, config))
        }
    }
}

/// Final state of every wallet bound in `registry`
pub(crate) fn collect_summaries<S: LedgerStore>(
    registry: &WalletRegistry,
    query: &QueryService<S>,
) -> Result<Vec<WalletSummary>, LedgerError> {
    registry
        .entries()
        .into_iter()
        .map(|(label, wallet_id)| {
            let wallet = query.get_wallet(wallet_id)?;
            let transactions = query.history(wallet_id)?.len();
            Ok(WalletSummary {
                label,
                name: wallet.name,
                balance: wallet.balance,
                transactions,
            })
        })
        .collect()
}

/// Log an operation that was skipped
pub(crate) fn log_rejected(operation: &LedgerOperation, error: &LedgerError) {
    tracing::warn!(
        wallet = operation.wallet(),
        op = operation.verb(),
        kind = %error.kind(),
        %error,
        "operation skipped"
    );
}
