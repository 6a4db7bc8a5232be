//! Synchronous processing strategy
//!
//! This module provides a single-threaded implementation of the
//! ProcessingStrategy trait. It orchestrates a batch run by coordinating
//! between the SyncReader (for CSV input), the WalletRegistry (label
//! bindings) and the LedgerEngine (business rules).
//!
//! # Design
//!
//! The SyncProcessingStrategy focuses on orchestration, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Operation application to `WalletRegistry::apply`
//! - CSV output to `csv_format::write_wallets_csv`
//!
//! Rows are streamed one at a time, so memory use grows with the number of
//! wallets and records, not with the size of the input file.

use crate::core::{LedgerEngine, LedgerStore, QueryService, WalletRegistry};
use crate::io::csv_format::write_wallets_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{collect_summaries, log_rejected, ProcessingStrategy};
use crate::types::LedgerError;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use wallet_ledger::core::InMemoryLedgerStore;
/// use wallet_ledger::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let strategy = SyncProcessingStrategy::new(Arc::new(InMemoryLedgerStore::default()));
/// let mut output = std::io::stdout();
///
/// strategy.process(Path::new("operations.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug)]
pub struct SyncProcessingStrategy<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> SyncProcessingStrategy<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: LedgerStore> ProcessingStrategy for SyncProcessingStrategy<S> {
    /// Apply operations in file order and write wallet summaries
    ///
    /// Fatal errors (file not found, output failures) are returned
    /// immediately. Individual row errors are logged and processing continues.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LedgerError> {
        let engine = LedgerEngine::new(Arc::clone(&self.store));
        let registry = WalletRegistry::new();

        let reader = SyncReader::new(input_path)?;

        for result in reader {
            match result {
                Ok(operation) => {
                    if let Err(error) = registry.apply(&engine, operation.clone()) {
                        log_rejected(&operation, &error);
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "skipping unreadable operation row");
                }
            }
        }

        let query = QueryService::new(Arc::clone(&self.store));
        let summaries = collect_summaries(&registry, &query)?;
        write_wallets_csv(&summaries, output)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::InMemoryLedgerStore;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn run(content: &str) -> String {
        let file = create_temp_csv(content);
        let strategy = SyncProcessingStrategy::new(Arc::new(InMemoryLedgerStore::default()));
        let mut output = Vec::new();
        strategy.process(file.path(), &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_sync_strategy_applies_setup_and_deltas() {
        let output = run("op,wallet,name,amount,description\n\
                          setup,alice,Alice,10,\n\
                          transact,alice,,5.5,pay\n\
                          transact,alice,,-15.5,\n");

        assert_eq!(
            output,
            "wallet,name,balance,transactions\nalice,Alice,0.0000,3\n"
        );
    }

    #[test]
    fn test_sync_strategy_skips_rejected_operations() {
        let output = run("op,wallet,name,amount,description\n\
                          setup,alice,Alice,10,\n\
                          transact,alice,,-15,\n\
                          transact,alice,,0.00001,\n\
                          transact,ghost,,1,\n\
                          refund,alice,,1,\n\
                          transact,alice,,1,\n");

        assert_eq!(
            output,
            "wallet,name,balance,transactions\nalice,Alice,11.0000,2\n"
        );
    }

    #[test]
    fn test_sync_strategy_handles_missing_file() {
        let strategy = SyncProcessingStrategy::new(Arc::new(InMemoryLedgerStore::default()));
        let mut output = Vec::new();

        let result = strategy.process(Path::new("nonexistent.csv"), &mut output);
        assert!(matches!(result, Err(LedgerError::Io { .. })));
    }

    #[test]
    fn test_sync_strategy_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncProcessingStrategy<InMemoryLedgerStore>>();
    }
}
