//! Batch processing with label-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which applies a batch of
//! ledger operations concurrently across wallets while keeping each wallet's
//! operations in file order.
//!
//! # Design
//!
//! The `BatchProcessor` partitions batches by wallet label. Each label's
//! operations run sequentially inside one tokio task; tasks for different
//! labels run concurrently, at most `max_concurrent` at a time.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     ├── AsyncLedgerEngine<S>   (shared engine, blocking pool)
//!     ├── Arc<WalletRegistry>    (label -> wallet bindings)
//!     └── Arc<Semaphore>         (bounds concurrent partitions)
//! ```
//!
//! # Thread Safety
//!
//! The processor is cloneable and can be safely shared across async tasks.
//! Clones share the engine, the registry and the semaphore.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinError;

use super::AsyncLedgerEngine;
use crate::core::registry::{OperationOutcome, WalletRegistry};
use crate::core::traits::LedgerStore;
use crate::types::{LedgerError, LedgerOperation, WalletLabel};

/// Result of applying a single operation
///
/// Contains the original operation and the result of applying it.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The operation that was applied
    pub operation: LedgerOperation,

    /// The outcome (receipt or error)
    pub result: Result<OperationOutcome, LedgerError>,
}

/// Batch processor with label-based partitioning
#[derive(Debug)]
pub struct BatchProcessor<S: LedgerStore + 'static> {
    engine: AsyncLedgerEngine<S>,
    registry: Arc<WalletRegistry>,
    permits: Arc<Semaphore>,
}

impl<S: LedgerStore + 'static> Clone for BatchProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            registry: Arc::clone(&self.registry),
            permits: Arc::clone(&self.permits),
        }
    }
}

impl<S: LedgerStore + 'static> BatchProcessor<S> {
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `engine` - AsyncLedgerEngine the operations are applied through
    /// * `registry` - Label bindings, shared across batches of one file
    /// * `max_concurrent` - Upper bound on labels processed at the same time
    ///   (zero is treated as one)
    pub fn new(
        engine: AsyncLedgerEngine<S>,
        registry: Arc<WalletRegistry>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            engine,
            registry,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// The label bindings this processor writes to
    pub fn registry(&self) -> &Arc<WalletRegistry> {
        &self.registry
    }

    /// Partition a batch of operations by wallet label
    ///
    /// # Guarantees
    ///
    /// - Each operation appears in exactly one sub-batch
    /// - Operations for each label keep their original order
    pub fn partition_by_label(
        &self,
        batch: Vec<LedgerOperation>,
    ) -> HashMap<WalletLabel, Vec<LedgerOperation>> {
        let mut label_batches: HashMap<WalletLabel, Vec<LedgerOperation>> = HashMap::new();

        for operation in batch {
            label_batches
                .entry(operation.wallet().to_string())
                .or_default()
                .push(operation);
        }

        label_batches
    }

    /// Apply one label's operations sequentially
    ///
    /// Every operation is attempted; failures are captured in the results and
    /// do not stop the remaining operations. Results keep input order.
    pub async fn process_label_operations(
        &self,
        operations: Vec<LedgerOperation>,
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(operations.len());

        for operation in operations {
            let result = self
                .engine
                .apply_operation(Arc::clone(&self.registry), operation.clone())
                .await;
            results.push(ProcessingResult { operation, result });
        }

        results
    }

    /// Apply a batch with label-based partitioning
    ///
    /// This method:
    /// 1. Partitions the batch by wallet label
    /// 2. Spawns one tokio task per label, each holding a semaphore permit
    /// 3. Waits for all tasks and collects their results
    ///
    /// Results for one label keep input order; results of different labels
    /// may interleave arbitrarily. Every operation of the batch gets a
    /// result, including those of a partition whose task failed.
    pub async fn process_batch(&self, batch: Vec<LedgerOperation>) -> Vec<ProcessingResult> {
        let label_batches = self.partition_by_label(batch);

        let mut tasks = Vec::with_capacity(label_batches.len());
        for (label, operations) in label_batches {
            let processor = self.clone();
            let submitted = operations.clone();
            let task = tokio::spawn(async move {
                let _permit = match Arc::clone(&processor.permits).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return failed_operations(operations, "batch processor shut down"),
                };
                tracing::debug!(wallet = %label, operations = operations.len(), "processing partition");
                processor.process_label_operations(operations).await
            });
            tasks.push((task, submitted));
        }

        let mut results = Vec::new();
        for (task, submitted) in tasks {
            results.extend(partition_results(task.await, submitted));
        }

        results
    }
}

/// Results of a finished partition task
///
/// A task that panicked or was cancelled may have applied any prefix of its
/// operations, so each one is reported as a `Storage` failure.
fn partition_results(
    joined: Result<Vec<ProcessingResult>, JoinError>,
    submitted: Vec<LedgerOperation>,
) -> Vec<ProcessingResult> {
    match joined {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(error = %e, operations = submitted.len(), "batch partition task failed");
            failed_operations(submitted, &format!("partition task failed, outcome unknown: {}", e))
        }
    }
}

fn failed_operations(operations: Vec<LedgerOperation>, message: &str) -> Vec<ProcessingResult> {
    operations
        .into_iter()
        .map(|operation| ProcessingResult {
            operation,
            result: Err(LedgerError::storage(message)),
        })
        .collect()
}
