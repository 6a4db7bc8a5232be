//! Transaction-related types for the wallet ledger
//!
//! This module defines the immutable transaction record, its direction, and
//! the [`BalanceCommit`] a store builds while a delta is being committed.

use super::decimal::Amount;
use super::wallet::{Wallet, WalletId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Description recorded on the transaction created by wallet setup
pub const SETUP_DESCRIPTION: &str = "Setup";

/// Transaction identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Allocate a fresh identifier
    pub fn generate() -> Self {
        TransactionId(Uuid::now_v7())
    }

    /// Wrap an identifier read back from storage
    pub fn from_uuid(uuid: Uuid) -> Self {
        TransactionId(uuid)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Funds added to the wallet
    Credit,

    /// Funds taken from the wallet
    Debit,
}

impl TransactionType {
    /// Direction implied by the sign of a delta
    ///
    /// Zero is treated as a credit; only the setup record can carry it.
    pub fn from_delta(delta: Amount) -> Self {
        if delta.is_negative() {
            TransactionType::Debit
        } else {
            TransactionType::Credit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "CREDIT",
            TransactionType::Debit => "DEBIT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful conditional balance update
///
/// Everything the transaction record needs to stay consistent with the commit
/// is captured while the wallet lock is held: the new balance, the commit's
/// position in the wallet's history and its timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceCommit {
    pub wallet_id: WalletId,

    /// The delta that was applied
    pub delta: Amount,

    /// Balance after the delta
    pub balance: Amount,

    /// Per-wallet commit ordinal (setup is 0)
    pub sequence: u64,

    /// Commit time, never earlier than the previous commit on the wallet
    pub committed_at: DateTime<Utc>,
}

/// Immutable record of one balance-changing event
///
/// Serializes as `{id, walletId, amount, balance, description, date, type}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,

    /// The wallet this record belongs to
    pub wallet_id: WalletId,

    /// Signed delta
    pub amount: Amount,

    /// Wallet balance immediately after this transaction
    pub balance: Amount,

    /// Trimmed description, at most 100 characters
    pub description: String,

    /// Commit time
    pub date: DateTime<Utc>,

    /// Direction derived from the sign of `amount`
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    /// Position in the wallet's history, used for ordering ties and replay
    #[serde(skip_serializing)]
    pub sequence: u64,
}

impl Transaction {
    /// The record written alongside a freshly created wallet
    pub fn setup(wallet: &Wallet) -> Self {
        Transaction {
            id: TransactionId::generate(),
            wallet_id: wallet.id,
            amount: wallet.balance,
            balance: wallet.balance,
            description: SETUP_DESCRIPTION.to_string(),
            date: wallet.created_at,
            transaction_type: TransactionType::Credit,
            sequence: 0,
        }
    }

    /// The record describing a committed delta
    pub fn from_commit(commit: &BalanceCommit, description: String) -> Self {
        Transaction {
            id: TransactionId::generate(),
            wallet_id: commit.wallet_id,
            amount: commit.delta,
            balance: commit.balance,
            description,
            date: commit.committed_at,
            transaction_type: TransactionType::from_delta(commit.delta),
            sequence: commit.sequence,
        }
    }
}
