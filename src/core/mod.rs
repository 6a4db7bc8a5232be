//! Core ledger logic
//!
//! This module contains the ledger's components:
//! - `traits` - the storage abstraction
//! - `store` - thread-safe in-memory store with per-wallet locking
//! - `engine` - wallet setup and balance deltas
//! - `query` - wallet snapshots, history paging and audit
//! - `registry` - label bindings for batch operation files
//! - `async` - async facade and concurrent batch processing

pub mod r#async;
pub mod engine;
pub mod query;
pub mod registry;
pub mod store;
pub mod traits;

pub use engine::{
    ApplyDeltaRequest, DeltaReceipt, LedgerEngine, SetupReceipt, SetupRequest,
    MAX_DESCRIPTION_CHARS,
};
pub use query::{AuditMismatch, AuditReport, Page, QueryService};
pub use r#async::{AsyncLedgerEngine, BatchProcessor, ProcessingResult};
pub use registry::{OperationOutcome, WalletRegistry};
pub use store::InMemoryLedgerStore;
pub use traits::LedgerStore;
