//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `decimal`: fixed-scale monetary amounts
//! - `wallet`: wallet snapshot and identifier
//! - `transaction`: transaction records, identifiers and balance commits
//! - `operation`: rows of a batch operations file
//! - `error`: error types for the ledger

pub mod decimal;
pub mod error;
pub mod operation;
pub mod transaction;
pub mod wallet;

pub use decimal::{Amount, RawAmount};
pub use error::{ErrorKind, LedgerError};
pub use operation::{LedgerOperation, WalletLabel};
pub use transaction::{BalanceCommit, Transaction, TransactionId, TransactionType};
pub use wallet::{Wallet, WalletId};
