//! Error types for the wallet ledger
//!
//! This module defines every error the ledger can return. Each variant maps to
//! a stable [`ErrorKind`] tag so callers at a request/response boundary can
//! translate failures without matching on message text.
//!
//! # Error Categories
//!
//! - **Validation**: malformed or out-of-range input, never retried
//! - **Not found**: the referenced wallet does not exist
//! - **Insufficient funds**: the delta would take the balance below zero
//! - **Conflict / Timeout**: transient contention, safe to retry because the
//!   store guarantees the failed call had no effect
//! - **Storage failure**: a durable write failed after validation passed
//! - **Partial commit**: a balance change was committed but its transaction
//!   record could not be written or undone

use super::decimal::Amount;
use super::wallet::WalletId;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Stable classification of a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    InsufficientFunds,
    Conflict,
    Timeout,
    StorageFailure,
    PartialCommit,
}

impl ErrorKind {
    /// Tag used in logs and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::StorageFailure => "STORAGE_FAILURE",
            ErrorKind::PartialCommit => "PARTIAL_COMMIT",
        }
    }

    /// HTTP-equivalent status code
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::ValidationError | ErrorKind::InsufficientFunds => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Timeout => 503,
            ErrorKind::StorageFailure | ErrorKind::PartialCommit => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the wallet ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// A request field failed validation
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Name of the offending field
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// A numeric value could not be turned into an amount
    #[error("Invalid amount '{raw}': {reason}")]
    InvalidAmount {
        /// The input as received
        raw: String,
        /// Why it was rejected
        reason: String,
    },

    /// Applying a delta would overflow the decimal range
    #[error("Arithmetic overflow applying {delta} to wallet {wallet}")]
    ArithmeticOverflow { wallet: WalletId, delta: Amount },

    /// The wallet does not exist
    #[error("Wallet {wallet} not found")]
    WalletNotFound { wallet: WalletId },

    /// The delta would leave a negative balance
    ///
    /// The balance is left unchanged and no transaction is recorded.
    #[error("Insufficient funds in wallet {wallet}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        wallet: WalletId,
        /// Balance observed inside the rejected commit
        balance: Amount,
        /// The (negative) delta that was requested
        requested: Amount,
    },

    /// Concurrent state moved underneath a conditional store operation
    #[error("Conflict on wallet {wallet}: {message}")]
    Conflict { wallet: WalletId, message: String },

    /// The wallet lock could not be acquired in time; nothing was applied
    #[error("Timed out after {waited_ms}ms waiting for wallet {wallet}")]
    Timeout { wallet: WalletId, waited_ms: u64 },

    /// A durable write failed
    #[error("Storage failure: {message}")]
    Storage { message: String },

    /// I/O error reading or writing files
    #[error("I/O error: {message}")]
    Io { message: String },

    /// CSV parsing error
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        message: String,
    },

    /// A wallet is visible but its opening transaction record is missing
    ///
    /// Raised only when setup could neither write the record nor discard the
    /// new wallet. Operators must reconcile the wallet by hand.
    #[error("Partial commit on wallet {wallet}: delta {delta} left balance {balance} without a transaction record ({reason})")]
    PartialCommit {
        wallet: WalletId,
        delta: Amount,
        balance: Amount,
        reason: String,
    },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::Parse {
            line,
            message: error.to_string(),
        }
    }
}

impl LedgerError {
    /// Stable kind tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. }
            | LedgerError::InvalidAmount { .. }
            | LedgerError::ArithmeticOverflow { .. } => ErrorKind::ValidationError,
            LedgerError::WalletNotFound { .. } => ErrorKind::NotFound,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::Conflict { .. } => ErrorKind::Conflict,
            LedgerError::Timeout { .. } => ErrorKind::Timeout,
            LedgerError::Storage { .. } | LedgerError::Io { .. } | LedgerError::Parse { .. } => {
                ErrorKind::StorageFailure
            }
            LedgerError::PartialCommit { .. } => ErrorKind::PartialCommit,
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict | ErrorKind::Timeout)
    }

    /// Create a Validation error
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        LedgerError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(raw: &str, reason: &str) -> Self {
        LedgerError::InvalidAmount {
            raw: raw.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(wallet: WalletId, delta: Amount) -> Self {
        LedgerError::ArithmeticOverflow { wallet, delta }
    }

    /// Create a WalletNotFound error
    pub fn wallet_not_found(wallet: WalletId) -> Self {
        LedgerError::WalletNotFound { wallet }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(wallet: WalletId, balance: Amount, requested: Amount) -> Self {
        LedgerError::InsufficientFunds {
            wallet,
            balance,
            requested,
        }
    }

    /// Create a Conflict error
    pub fn conflict(wallet: WalletId, message: impl Into<String>) -> Self {
        LedgerError::Conflict {
            wallet,
            message: message.into(),
        }
    }

    /// Create a Timeout error
    pub fn timeout(wallet: WalletId, waited: Duration) -> Self {
        LedgerError::Timeout {
            wallet,
            waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage {
            message: message.into(),
        }
    }

    /// Create a PartialCommit error
    pub fn partial_commit(
        wallet: WalletId,
        delta: Amount,
        balance: Amount,
        reason: impl Into<String>,
    ) -> Self {
        LedgerError::PartialCommit {
            wallet,
            delta,
            balance,
            reason: reason.into(),
        }
    }
}
