//! Asynchronous batch processing strategy
//!
//! This module provides a multi-threaded implementation of the
//! ProcessingStrategy trait. It reads operations in batches and applies each
//! batch with label-based partitioning.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (label partitioning + bounded concurrency)
//!     └── AsyncLedgerEngine (engine calls on the blocking pool)
//! ```
//!
//! # Ordering
//!
//! - Batches are processed one after another, so a label whose operations
//!   span several batches still sees them in file order
//! - Within a batch, labels are processed concurrently

use crate::core::{AsyncLedgerEngine, BatchProcessor, LedgerStore, WalletRegistry};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_wallets_csv;
use crate::strategy::{collect_summaries, log_rejected, ProcessingStrategy};
use crate::types::LedgerError;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Configuration for batch processing
///
/// Controls how many operations are read per batch and how many wallet
/// labels are processed at the same time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of operations per batch
    pub batch_size: usize,

    /// Maximum number of labels processed concurrently, also the number of
    /// runtime worker threads
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig with custom values
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn new(batch_size: usize, max_concurrent: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            tracing::warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent = if max_concurrent == 0 {
            tracing::warn!(
                max_concurrent,
                default = default.max_concurrent,
                "invalid concurrency limit, using default"
            );
            default.max_concurrent
        } else {
            max_concurrent
        };

        Self {
            batch_size,
            max_concurrent,
        }
    }
}

/// Asynchronous batch processing strategy
#[derive(Debug)]
pub struct AsyncProcessingStrategy<S: LedgerStore + 'static> {
    store: Arc<S>,
    config: BatchConfig,
}

impl<S: LedgerStore + 'static> AsyncProcessingStrategy<S> {
    /// Create a new AsyncProcessingStrategy
    ///
    /// # Arguments
    ///
    /// * `store` - Store the operations are applied to
    /// * `config` - BatchConfig with batch_size and max_concurrent
    pub fn new(store: Arc<S>, config: BatchConfig) -> Self {
        Self { store, config }
    }
}

impl<S: LedgerStore + 'static> ProcessingStrategy for AsyncProcessingStrategy<S> {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LedgerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent)
            .build()
            .map_err(|e| LedgerError::Io {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let engine = AsyncLedgerEngine::new(Arc::clone(&self.store));
            let registry = Arc::new(WalletRegistry::new());
            let processor = BatchProcessor::new(
                engine.clone(),
                Arc::clone(&registry),
                self.config.max_concurrent,
            );

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| LedgerError::Io {
                    message: format!("Failed to open file '{}': {}", input_path.display(), e),
                })?;

            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                for processed in processor.process_batch(batch).await {
                    if let Err(error) = &processed.result {
                        log_rejected(&processed.operation, error);
                    }
                }
            }

            let summaries = collect_summaries(&registry, engine.query())?;
            write_wallets_csv(&summaries, output)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::InMemoryLedgerStore;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn run(content: &str, config: BatchConfig) -> String {
        let file = create_temp_csv(content);
        let strategy =
            AsyncProcessingStrategy::new(Arc::new(InMemoryLedgerStore::default()), config);
        let mut output = Vec::new();
        strategy.process(file.path(), &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[rstest]
    #[case::zero_batch_size(0, 4, 1000, 4)]
    #[case::zero_concurrency(10, 0, 10, num_cpus::get())]
    #[case::custom(10, 2, 10, 2)]
    fn test_batch_config_new(
        #[case] batch_size: usize,
        #[case] max_concurrent: usize,
        #[case] expected_batch_size: usize,
        #[case] expected_concurrent: usize,
    ) {
        let config = BatchConfig::new(batch_size, max_concurrent);
        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent, expected_concurrent);
    }

    #[test]
    fn test_async_strategy_applies_operations() {
        let output = run(
            "op,wallet,name,amount,description\n\
             setup,a,Alice,10,\n\
             setup,b,Bob,,\n\
             transact,a,,5.5,pay\n\
             transact,b,,2,\n",
            BatchConfig::default(),
        );

        assert_eq!(
            output,
            "wallet,name,balance,transactions\n\
             a,Alice,15.5000,2\n\
             b,Bob,2.0000,2\n"
        );
    }

    #[test]
    fn test_async_strategy_maintains_ordering_across_batches() {
        // A debit that only succeeds after the preceding credit
        let output = run(
            "op,wallet,name,amount,description\n\
             setup,a,Alice,0,\n\
             setup,b,Bob,50,\n\
             transact,a,,100,\n\
             transact,b,,25,\n\
             transact,a,,-30,\n\
             transact,a,,-20,\n",
            BatchConfig::new(2, 2),
        );

        assert_eq!(
            output,
            "wallet,name,balance,transactions\n\
             a,Alice,50.0000,4\n\
             b,Bob,75.0000,2\n"
        );
    }

    #[test]
    fn test_async_strategy_handles_missing_file() {
        let strategy = AsyncProcessingStrategy::new(
            Arc::new(InMemoryLedgerStore::default()),
            BatchConfig::default(),
        );
        let mut output = Vec::new();

        let result = strategy.process(Path::new("nonexistent.csv"), &mut output);
        match result {
            Err(LedgerError::Io { message }) => assert!(message.contains("Failed to open file")),
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
