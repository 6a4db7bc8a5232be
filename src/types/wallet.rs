//! Wallet types for the wallet ledger
//!
//! This module defines the Wallet snapshot and its identifier.

use super::decimal::Amount;
use super::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Wallet identifier
///
/// Opaque to callers. Generated as a UUID v7 so identifiers sort roughly by
/// creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct WalletId(Uuid);

impl WalletId {
    /// Allocate a fresh identifier
    pub fn generate() -> Self {
        WalletId(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for WalletId {
    type Err = LedgerError;

    /// Parse an identifier, failing with a validation error when malformed
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(WalletId)
            .map_err(|_| LedgerError::validation("walletId", format!("'{}' is not a valid wallet id", s)))
    }
}

/// Wallet snapshot
///
/// A point-in-time copy of the wallet's state. Serializes as
/// `{id, balance, name, date}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wallet {
    /// Immutable identity
    pub id: WalletId,

    /// Current balance, never negative
    pub balance: Amount,

    /// Display name, trimmed and non-empty
    pub name: String,

    /// Creation time, set once
    #[serde(rename = "date")]
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a wallet with a fresh identity stamped with the current time
    pub fn new(name: &str, balance: Amount) -> Self {
        Wallet {
            id: WalletId::generate(),
            balance,
            name: name.trim().to_string(),
            created_at: Utc::now(),
        }
    }
}
