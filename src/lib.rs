//! Wallet Ledger Library
//! # Overview
//!
//! This library keeps wallet balances together with an append-only history of
//! the transactions that produced them. Every balance change is a conditional
//! atomic step on one wallet, so concurrent debits can never overdraw it.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Amount, Wallet, Transaction, LedgerError)
//! - [`config`] - Store and engine settings
//! - [`cli`] - CLI arguments parsing and command dispatch
//! - [`core`] - Business logic components:
//!   - [`core::store`] - In-memory store with per-wallet locking
//!   - [`core::engine`] - Wallet setup and balance deltas
//!   - [`core::query`] - Wallet snapshots, history paging and audit
//!   - [`core::registry`] - Label bindings for operation files
//! - [`io`] - CSV input and output, and the journal-backed store
//! - [`strategy`] - Sync and async pipelines for operation files
//! - [`telemetry`] - Logging initialization
//!
//! # Operations
//!
//! - **Setup**: Create a wallet with an optional non-negative opening balance
//! - **ApplyDelta**: Add a signed amount; a debit that would leave a negative
//!   balance is rejected and leaves no trace
//! - **Queries**: Current wallet state, paged history (newest first), full
//!   history export (oldest first) and a replay audit
//!
//! # Amounts
//!
//! Amounts are exact decimals with four fractional digits. Inputs with more
//! precision are rejected rather than rounded.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod strategy;
pub mod telemetry;
pub mod types;

pub use config::LedgerConfig;
pub use core::{
    AsyncLedgerEngine, InMemoryLedgerStore, LedgerEngine, LedgerStore, Page, QueryService,
};
pub use io::{JournalOptions, JournalStore};
pub use types::{
    Amount, ErrorKind, LedgerError, RawAmount, Transaction, TransactionId, TransactionType,
    Wallet, WalletId,
};
