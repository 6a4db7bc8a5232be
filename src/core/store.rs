//! In-memory ledger store
//!
//! This module provides [`InMemoryLedgerStore`], the [`LedgerStore`]
//! implementation used directly by tests and batch runs, and wrapped by the
//! journal-backed store for durability.
//!
//! # Design
//!
//! Wallets live in a `DashMap` keyed by [`WalletId`]. Each entry is an
//! `Arc<parking_lot::Mutex<WalletState>>`, so the map's shard lock is only held
//! long enough to clone the `Arc`; the per-wallet mutex is what serializes
//! operations on one wallet. Operations on different wallets never contend.
//!
//! # Compare-and-commit
//!
//! `apply_delta` reads the balance, checks the candidate result, builds the
//! transaction record and writes both while holding the wallet mutex. There
//! is no window in which another operation can observe a negative balance or
//! a balance without its record, and a rejected delta changes nothing.
//!
//! # Bounded waits
//!
//! The wallet mutex is acquired with `try_lock_for(lock_timeout)`. On expiry
//! the call fails with [`LedgerError::Timeout`] before touching any state.

use crate::config::DEFAULT_LOCK_TIMEOUT;
use crate::core::traits::LedgerStore;
use crate::types::{
    Amount, BalanceCommit, LedgerError, Transaction, TransactionId, Wallet, WalletId,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Mutable state of one wallet, guarded by its own mutex
#[derive(Debug)]
struct WalletState {
    wallet: Wallet,

    /// Ordinal of the latest committed delta (setup is 0)
    sequence: u64,

    /// Timestamp of the latest commit, used to keep dates monotonic
    last_commit_at: DateTime<Utc>,

    /// Transaction records in ascending sequence order
    history: Vec<Transaction>,

    /// Set when the wallet is removed, for callers that cloned the cell first
    discarded: bool,
}

impl WalletState {
    fn new(wallet: Wallet) -> Self {
        WalletState {
            last_commit_at: wallet.created_at,
            wallet,
            sequence: 0,
            history: Vec::new(),
            discarded: false,
        }
    }
}

type WalletCell = Arc<Mutex<WalletState>>;

/// Thread-safe in-memory implementation of [`LedgerStore`]
#[derive(Debug)]
pub struct InMemoryLedgerStore {
    wallets: DashMap<WalletId, WalletCell>,
    lock_timeout: Duration,
}

impl InMemoryLedgerStore {
    /// Create an empty store whose wallet locks wait at most `lock_timeout`
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            wallets: DashMap::new(),
            lock_timeout,
        }
    }

    /// Number of wallets held
    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Identifiers of every wallet, in no particular order
    pub fn wallet_ids(&self) -> Vec<WalletId> {
        self.wallets.iter().map(|entry| *entry.key()).collect()
    }

    fn cell(&self, wallet_id: WalletId) -> Result<WalletCell, LedgerError> {
        self.wallets
            .get(&wallet_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LedgerError::wallet_not_found(wallet_id))
    }

    /// Run `f` with exclusive access to one wallet
    ///
    /// The closure executes while holding the wallet mutex, so everything it
    /// reads and writes is a single atomic step with respect to every other
    /// operation on the same wallet.
    fn with_wallet<T, F>(&self, wallet_id: WalletId, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut WalletState) -> Result<T, LedgerError>,
    {
        let cell = self.cell(wallet_id)?;
        let mut state = cell
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| LedgerError::timeout(wallet_id, self.lock_timeout))?;

        if state.discarded {
            return Err(LedgerError::wallet_not_found(wallet_id));
        }

        f(&mut state)
    }

    /// Create a wallet, calling `persist` before it becomes visible
    ///
    /// If `persist` fails the wallet is never inserted.
    pub(crate) fn create_wallet_with<P>(
        &self,
        name: &str,
        initial_balance: Amount,
        persist: P,
    ) -> Result<Wallet, LedgerError>
    where
        P: FnOnce(&Wallet) -> Result<(), LedgerError>,
    {
        if name.trim().is_empty() {
            return Err(LedgerError::validation("name", "must not be empty"));
        }
        if initial_balance.is_negative() {
            return Err(LedgerError::validation("balance", "must not be negative"));
        }

        let wallet = Wallet::new(name, initial_balance);
        persist(&wallet)?;

        self.wallets
            .insert(wallet.id, Arc::new(Mutex::new(WalletState::new(wallet.clone()))));

        Ok(wallet)
    }

    /// Commit a delta together with its transaction record
    ///
    /// The balance check, the record and `persist` all run under the wallet
    /// lock. The new balance and the record become visible together, and
    /// only after `persist` succeeds; any failure leaves the wallet untouched.
    pub(crate) fn apply_delta_with<P>(
        &self,
        wallet_id: WalletId,
        delta: Amount,
        description: &str,
        persist: P,
    ) -> Result<Transaction, LedgerError>
    where
        P: FnOnce(&Transaction) -> Result<(), LedgerError>,
    {
        self.with_wallet(wallet_id, |state| {
            let current = state.wallet.balance;
            let balance = current
                .checked_add(delta)
                .ok_or_else(|| LedgerError::arithmetic_overflow(wallet_id, delta))?;

            if balance.is_negative() {
                return Err(LedgerError::insufficient_funds(wallet_id, current, delta));
            }

            let commit = BalanceCommit {
                wallet_id,
                delta,
                balance,
                sequence: state.sequence + 1,
                committed_at: Utc::now().max(state.last_commit_at),
            };
            let record = Transaction::from_commit(&commit, description.to_string());

            persist(&record)?;

            state.wallet.balance = balance;
            state.sequence = commit.sequence;
            state.last_commit_at = commit.committed_at;
            state.history.push(record.clone());
            Ok(record)
        })
    }

    /// Append a record, calling `persist` after validation and before insertion
    ///
    /// The wallet lock is held across `persist`, so durable order matches the
    /// order records become visible.
    pub(crate) fn append_transaction_with<P>(
        &self,
        record: Transaction,
        persist: P,
    ) -> Result<TransactionId, LedgerError>
    where
        P: FnOnce(&Transaction) -> Result<(), LedgerError>,
    {
        let wallet_id = record.wallet_id;
        self.with_wallet(wallet_id, |state| {
            if record.sequence > state.sequence {
                return Err(LedgerError::conflict(
                    wallet_id,
                    format!(
                        "record sequence {} is ahead of the latest commit {}",
                        record.sequence, state.sequence
                    ),
                ));
            }

            let position = state
                .history
                .partition_point(|existing| existing.sequence < record.sequence);
            if state
                .history
                .get(position)
                .is_some_and(|existing| existing.sequence == record.sequence)
            {
                return Err(LedgerError::conflict(
                    wallet_id,
                    format!("sequence {} is already recorded", record.sequence),
                ));
            }

            persist(&record)?;

            let id = record.id;
            state.history.insert(position, record);
            Ok(id)
        })
    }

    /// Discard an orphan wallet, calling `persist` before it disappears
    pub(crate) fn discard_wallet_with<P>(
        &self,
        wallet_id: WalletId,
        persist: P,
    ) -> Result<(), LedgerError>
    where
        P: FnOnce(WalletId) -> Result<(), LedgerError>,
    {
        self.with_wallet(wallet_id, |state| {
            if state.sequence != 0 || !state.history.is_empty() {
                return Err(LedgerError::conflict(
                    wallet_id,
                    "wallet has recorded history and cannot be discarded",
                ));
            }

            persist(wallet_id)?;

            state.discarded = true;
            self.wallets.remove(&wallet_id);
            Ok(())
        })
    }

    /// Reinstate a wallet and its history read back from durable storage
    ///
    /// `history` must already be in ascending sequence order and replay
    /// consistent; the wallet's balance is taken from the latest record.
    pub(crate) fn restore(&self, mut wallet: Wallet, history: Vec<Transaction>) {
        let mut state = WalletState::new(wallet.clone());
        if let Some(last) = history.last() {
            wallet.balance = last.balance;
            state.wallet = wallet.clone();
            state.sequence = last.sequence;
            state.last_commit_at = last.date.max(wallet.created_at);
        }
        state.history = history;

        self.wallets.insert(wallet.id, Arc::new(Mutex::new(state)));
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn create_wallet(&self, name: &str, initial_balance: Amount) -> Result<Wallet, LedgerError> {
        self.create_wallet_with(name, initial_balance, |_| Ok(()))
    }

    fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet, LedgerError> {
        self.with_wallet(wallet_id, |state| Ok(state.wallet.clone()))
    }

    fn exists(&self, wallet_id: WalletId) -> bool {
        self.wallets.contains_key(&wallet_id)
    }

    fn apply_delta(
        &self,
        wallet_id: WalletId,
        delta: Amount,
        description: &str,
    ) -> Result<Transaction, LedgerError> {
        self.apply_delta_with(wallet_id, delta, description, |_| Ok(()))
    }

    fn append_transaction(&self, record: Transaction) -> Result<TransactionId, LedgerError> {
        self.append_transaction_with(record, |_| Ok(()))
    }

    fn list_transactions(
        &self,
        wallet_id: WalletId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.with_wallet(wallet_id, |state| {
            Ok(state
                .history
                .iter()
                .rev()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect())
        })
    }

    fn discard_wallet(&self, wallet_id: WalletId) -> Result<(), LedgerError> {
        self.discard_wallet_with(wallet_id, |_| Ok(()))
    }
}
