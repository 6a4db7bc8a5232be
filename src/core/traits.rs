//! Core traits for ledger storage
//!
//! This module defines the storage abstraction the engine and query service
//! are written against, so the in-memory store and the journal-backed store
//! can be used interchangeably (and tests can substitute a failing one).

use crate::types::{Amount, LedgerError, Transaction, TransactionId, Wallet, WalletId};

/// Keyed storage for wallets and their append-only transaction history
///
/// Implementations must make [`apply_delta`](LedgerStore::apply_delta) a
/// single conditional atomic step per wallet: the balance is read, checked and
/// written, and its record stored, without any other call on the same wallet
/// interleaving. A rejected delta leaves no trace. Calls that wait for a
/// wallet must give up after a bounded time with [`LedgerError::Timeout`],
/// having changed nothing.
pub trait LedgerStore: Send + Sync {
    /// Allocate an identity and persist a new wallet
    ///
    /// Fails with a validation error if `name` is empty after trimming or the
    /// initial balance is negative.
    fn create_wallet(&self, name: &str, initial_balance: Amount) -> Result<Wallet, LedgerError>;

    /// Current snapshot of a wallet
    fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet, LedgerError>;

    /// Whether the wallet exists
    fn exists(&self, wallet_id: WalletId) -> bool;

    /// Add `delta` to the balance and record it, if the result stays non-negative
    ///
    /// The balance change and its transaction record are one atomic step:
    /// both become visible (and durable, for persistent stores) together, or
    /// neither does. Returns the record, which carries the new balance.
    ///
    /// # Errors
    ///
    /// - `WalletNotFound` if the wallet does not exist
    /// - `InsufficientFunds` if the result would be negative (nothing changes)
    /// - `ArithmeticOverflow` if the result is out of range (nothing changes)
    /// - `Timeout` if the wallet lock could not be acquired in time (nothing changes)
    /// - `Storage` if the record could not be persisted (nothing changes)
    fn apply_delta(
        &self,
        wallet_id: WalletId,
        delta: Amount,
        description: &str,
    ) -> Result<Transaction, LedgerError>;

    /// Persist an immutable transaction record
    ///
    /// Used for the opening record written by wallet setup.
    fn append_transaction(&self, record: Transaction) -> Result<TransactionId, LedgerError>;

    /// A page of the wallet's history, newest first
    fn list_transactions(
        &self,
        wallet_id: WalletId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerError>;

    /// Remove a wallet that has no committed deltas and no transactions
    ///
    /// Used to clean up after a setup whose transaction record failed.
    fn discard_wallet(&self, wallet_id: WalletId) -> Result<(), LedgerError>;
}
