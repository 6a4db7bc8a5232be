//! Asynchronous access to the ledger
//!
//! This module lets async callers drive the ledger without blocking tokio
//! worker threads on wallet locks.
//!
//! # Architecture
//!
//! - **AsyncLedgerEngine**: engine and query calls run on the blocking pool
//! - **BatchProcessor**: applies batches of labelled operations, one task per
//!   wallet label, with bounded concurrency
//!
//! # Thread Safety
//!
//! Both types are cheap to clone and share one store:
//! - Operations on different wallets proceed in parallel
//! - Operations on the same wallet are serialized by the store's wallet lock

pub mod batch_processor;
pub mod engine;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use engine::AsyncLedgerEngine;
