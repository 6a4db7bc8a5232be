//! Read-only queries over a ledger store
//!
//! [`QueryService`] serves wallet snapshots, paged transaction history and an
//! audit that replays a wallet's history against its recorded balances.

use crate::config::DEFAULT_PAGE_LIMIT;
use crate::core::traits::LedgerStore;
use crate::types::{Amount, LedgerError, Transaction, TransactionId, Wallet, WalletId};
use serde::Serialize;
use std::sync::Arc;

/// Offset and size of a transaction listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

impl Page {
    /// Validate caller-supplied paging values
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `skip` is negative or `limit` is below 1.
    pub fn new(skip: i64, limit: i64) -> Result<Self, LedgerError> {
        let skip = usize::try_from(skip)
            .map_err(|_| LedgerError::validation("skip", "must be zero or greater"))?;
        let limit = usize::try_from(limit)
            .ok()
            .filter(|limit| *limit >= 1)
            .ok_or_else(|| LedgerError::validation("limit", "must be at least 1"))?;

        Ok(Page { skip, limit })
    }
}

impl Default for Page {
    fn default() -> Self {
        Page {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// First record whose balance disagrees with the replayed sum
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMismatch {
    pub transaction_id: TransactionId,
    pub sequence: u64,
    pub recorded_balance: Amount,
    pub expected_balance: Amount,
}

/// Outcome of replaying one wallet's history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub wallet_id: WalletId,

    /// Number of transaction records replayed
    pub records: usize,

    /// True when every record matches and the replay ends at the current balance
    pub consistent: bool,

    pub replayed_balance: Amount,
    pub current_balance: Amount,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_mismatch: Option<AuditMismatch>,
}

/// Wallet lookups and history queries
#[derive(Debug)]
pub struct QueryService<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for QueryService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> QueryService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Current snapshot of a wallet
    pub fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet, LedgerError> {
        self.store.get_wallet(wallet_id)
    }

    /// One page of a wallet's history, newest first
    ///
    /// A page starting past the end is empty rather than an error.
    pub fn list_transactions(
        &self,
        wallet_id: WalletId,
        page: Page,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.store
            .list_transactions(wallet_id, page.skip, page.limit)
    }

    /// A wallet's full history, oldest first
    pub fn history(&self, wallet_id: WalletId) -> Result<Vec<Transaction>, LedgerError> {
        let mut records = self.store.list_transactions(wallet_id, 0, usize::MAX)?;
        records.reverse();
        Ok(records)
    }

    /// Replay a wallet's history and compare it with the recorded balances
    ///
    /// The history and the wallet snapshot are read separately, so a delta
    /// whose record is still being written shows up as a difference between
    /// the replayed and current balance.
    pub fn audit(&self, wallet_id: WalletId) -> Result<AuditReport, LedgerError> {
        let records = self.history(wallet_id)?;
        let wallet = self.store.get_wallet(wallet_id)?;

        let mut replayed = Amount::ZERO;
        let mut first_mismatch = None;

        for record in &records {
            replayed = replayed
                .checked_add(record.amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow(wallet_id, record.amount))?;

            if first_mismatch.is_none() && replayed != record.balance {
                first_mismatch = Some(AuditMismatch {
                    transaction_id: record.id,
                    sequence: record.sequence,
                    recorded_balance: record.balance,
                    expected_balance: replayed,
                });
            }
        }

        Ok(AuditReport {
            wallet_id,
            records: records.len(),
            consistent: first_mismatch.is_none() && replayed == wallet.balance,
            replayed_balance: replayed,
            current_balance: wallet.balance,
            first_mismatch,
        })
    }
}
