//! Ledger engine
//!
//! This module provides the [`LedgerEngine`], which creates wallets and applies
//! balance-changing deltas by composing the atomic primitives of a
//! [`LedgerStore`].
//!
//! The engine enforces business rules such as:
//! - Names are non-empty after trimming
//! - Amounts are finite, carry at most 4 fractional digits, and deltas are nonzero
//! - Descriptions are at most 100 characters after trimming
//! - A balance never goes below zero (enforced inside the store's conditional commit)
//! - Every committed delta has exactly one transaction record, written in the
//!   same critical section as the balance change

use crate::core::traits::LedgerStore;
use crate::types::{
    Amount, ErrorKind, LedgerError, RawAmount, Transaction, TransactionId, Wallet, WalletId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Longest description accepted, in characters after trimming
pub const MAX_DESCRIPTION_CHARS: usize = 100;

/// Input of [`LedgerEngine::setup`]
#[derive(Debug, Clone, PartialEq)]
pub struct SetupRequest {
    pub name: String,

    /// Initial balance, zero when absent
    pub balance: Option<RawAmount>,
}

/// Input of [`LedgerEngine::apply_delta`]
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyDeltaRequest {
    pub wallet_id: WalletId,

    /// Signed delta: positive credits, negative debits
    pub amount: RawAmount,

    pub description: Option<String>,
}

/// Result of a successful setup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupReceipt {
    pub id: WalletId,
    pub balance: Amount,
    pub transaction_id: TransactionId,
    pub name: String,
    pub date: DateTime<Utc>,
}

/// Result of a successful delta
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaReceipt {
    pub balance: Amount,
    pub transaction_id: TransactionId,
}

/// Wallet creation and balance changes
///
/// The engine is stateless apart from its store handle; it is `Send + Sync`
/// whenever the store is and can be shared across threads behind an `Arc`.
#[derive(Debug)]
pub struct LedgerEngine<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for LedgerEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Create an engine over an explicitly constructed store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The store this engine writes to
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create a wallet and its opening transaction
    ///
    /// # Errors
    ///
    /// - `Validation` if the name is empty or the balance is negative
    /// - `InvalidAmount` if the balance is not a finite decimal with at most
    ///   4 fractional digits
    /// - the store's error if the wallet cannot be created
    /// - the append error if the opening record fails and the orphan wallet
    ///   was discarded, or `PartialCommit` if it could not be discarded
    pub fn setup(&self, request: SetupRequest) -> Result<SetupReceipt, LedgerError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(LedgerError::validation("name", "must not be empty"));
        }

        let balance = match &request.balance {
            Some(raw) => raw.to_exact()?,
            None => Amount::ZERO,
        };
        if balance.is_negative() {
            return Err(LedgerError::validation("balance", "must not be negative"));
        }

        let wallet = self.store.create_wallet(name, balance)?;

        let transaction_id = match self.store.append_transaction(Transaction::setup(&wallet)) {
            Ok(id) => id,
            Err(cause) => return Err(self.discard_orphan(&wallet, cause)),
        };

        info!(
            wallet = %wallet.id,
            transaction = %transaction_id,
            balance = %wallet.balance,
            "wallet created"
        );

        Ok(SetupReceipt {
            id: wallet.id,
            balance: wallet.balance,
            transaction_id,
            name: wallet.name,
            date: wallet.created_at,
        })
    }

    /// Apply a signed delta and record it
    ///
    /// Validation happens before anything is written. The balance change and
    /// its record are a single conditional commit in the store, so a delta
    /// that would overdraw the wallet, or whose record cannot be written, is
    /// rejected without ever being visible to other callers.
    ///
    /// # Errors
    ///
    /// - `WalletNotFound` if the wallet does not exist
    /// - `InvalidAmount` / `Validation` for a malformed, zero or over-precise
    ///   amount, or a description longer than 100 characters
    /// - `InsufficientFunds` if the balance would go negative (nothing changes)
    /// - `Timeout` if the wallet stayed busy past the lock timeout (nothing changes)
    /// - `Storage` if the record could not be persisted (nothing changes)
    pub fn apply_delta(&self, request: ApplyDeltaRequest) -> Result<DeltaReceipt, LedgerError> {
        let wallet_id = request.wallet_id;
        if !self.store.exists(wallet_id) {
            return Err(LedgerError::wallet_not_found(wallet_id));
        }

        let delta = request.amount.to_exact()?;
        if delta.is_zero() {
            return Err(LedgerError::validation("amount", "must not be zero"));
        }

        let description = normalize_description(request.description.as_deref())?;

        let record = self
            .store
            .apply_delta(wallet_id, delta, &description)
            .map_err(|error| {
                if error.kind() == ErrorKind::StorageFailure {
                    error!(wallet = %wallet_id, %delta, %error, "delta record failed, nothing applied");
                } else {
                    debug!(wallet = %wallet_id, %delta, kind = %error.kind(), "delta rejected");
                }
                error
            })?;

        info!(
            wallet = %wallet_id,
            transaction = %record.id,
            %delta,
            balance = %record.balance,
            "delta applied"
        );

        Ok(DeltaReceipt {
            balance: record.balance,
            transaction_id: record.id,
        })
    }

    /// Remove a wallet whose opening record could not be written
    fn discard_orphan(&self, wallet: &Wallet, cause: LedgerError) -> LedgerError {
        match self.store.discard_wallet(wallet.id) {
            Ok(()) => {
                error!(wallet = %wallet.id, error = %cause, "setup record failed, wallet discarded");
                cause
            }
            Err(discard_error) => {
                error!(
                    wallet = %wallet.id,
                    error = %cause,
                    discard_error = %discard_error,
                    "setup record failed and wallet could not be discarded"
                );
                LedgerError::partial_commit(
                    wallet.id,
                    wallet.balance,
                    wallet.balance,
                    format!("setup record failed: {}; discard failed: {}", cause, discard_error),
                )
            }
        }
    }
}

/// Trim a description and enforce the length limit
fn normalize_description(raw: Option<&str>) -> Result<String, LedgerError> {
    let description = raw.map(str::trim).unwrap_or_default();
    let length = description.chars().count();
    if length > MAX_DESCRIPTION_CHARS {
        return Err(LedgerError::validation(
            "description",
            format!(
                "must be at most {} characters, got {}",
                MAX_DESCRIPTION_CHARS, length
            ),
        ));
    }
    Ok(description.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::QueryService;
    use crate::core::store::InMemoryLedgerStore;
    use crate::types::TransactionType;
    use rstest::rstest;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn amount(raw: &str) -> Amount {
        Amount::parse(raw).unwrap()
    }

    fn engine() -> LedgerEngine<InMemoryLedgerStore> {
        LedgerEngine::new(Arc::new(InMemoryLedgerStore::default()))
    }

    fn setup(engine: &LedgerEngine<impl LedgerStore>, balance: &str) -> WalletId {
        engine
            .setup(SetupRequest {
                name: "Alice".to_string(),
                balance: Some(balance.into()),
            })
            .unwrap()
            .id
    }

    fn delta(wallet_id: WalletId, amount: &str) -> ApplyDeltaRequest {
        ApplyDeltaRequest {
            wallet_id,
            amount: amount.into(),
            description: None,
        }
    }

    /// Store double whose record writes can be made to fail
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: InMemoryLedgerStore,
        fail_appends: AtomicBool,
        fail_discards: AtomicBool,
    }

    impl FlakyStore {
        fn check_append(&self) -> Result<(), LedgerError> {
            if self.fail_appends.load(Ordering::SeqCst) {
                return Err(LedgerError::storage("journal unavailable"));
            }
            Ok(())
        }
    }

    impl LedgerStore for FlakyStore {
        fn create_wallet(&self, name: &str, initial_balance: Amount) -> Result<Wallet, LedgerError> {
            self.inner.create_wallet(name, initial_balance)
        }

        fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet, LedgerError> {
            self.inner.get_wallet(wallet_id)
        }

        fn exists(&self, wallet_id: WalletId) -> bool {
            self.inner.exists(wallet_id)
        }

        fn apply_delta(
            &self,
            wallet_id: WalletId,
            delta: Amount,
            description: &str,
        ) -> Result<Transaction, LedgerError> {
            self.inner
                .apply_delta_with(wallet_id, delta, description, |_| self.check_append())
        }

        fn append_transaction(&self, record: Transaction) -> Result<TransactionId, LedgerError> {
            self.inner
                .append_transaction_with(record, |_| self.check_append())
        }

        fn list_transactions(
            &self,
            wallet_id: WalletId,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<Transaction>, LedgerError> {
            self.inner.list_transactions(wallet_id, offset, limit)
        }

        fn discard_wallet(&self, wallet_id: WalletId) -> Result<(), LedgerError> {
            if self.fail_discards.load(Ordering::SeqCst) {
                return Err(LedgerError::storage("journal unavailable"));
            }
            self.inner.discard_wallet(wallet_id)
        }
    }

    #[test]
    fn test_setup_creates_wallet_and_credit() {
        let engine = engine();
        let receipt = engine
            .setup(SetupRequest {
                name: " Alice ".to_string(),
                balance: Some("10.0000".into()),
            })
            .unwrap();

        assert_eq!(receipt.name, "Alice");
        assert_eq!(receipt.balance, amount("10"));

        let history = engine.store().list_transactions(receipt.id, 0, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, receipt.transaction_id);
        assert_eq!(history[0].transaction_type, TransactionType::Credit);
        assert_eq!(history[0].amount, amount("10"));
        assert_eq!(history[0].balance, amount("10"));
        assert_eq!(history[0].description, "Setup");
    }

    #[test]
    fn test_setup_without_balance_starts_at_zero() {
        let engine = engine();
        let receipt = engine
            .setup(SetupRequest {
                name: "Bob".to_string(),
                balance: None,
            })
            .unwrap();
        assert_eq!(receipt.balance, Amount::ZERO);
    }

    #[rstest]
    #[case::empty_name("", Some("10"))]
    #[case::blank_name("   ", Some("10"))]
    #[case::negative_balance("Alice", Some("-1"))]
    #[case::too_precise("Alice", Some("1.00001"))]
    #[case::not_a_number("Alice", Some("ten"))]
    fn test_setup_validation(#[case] name: &str, #[case] balance: Option<&str>) {
        let engine = engine();
        let error = engine
            .setup(SetupRequest {
                name: name.to_string(),
                balance: balance.map(RawAmount::from),
            })
            .unwrap_err();

        assert_eq!(error.kind(), crate::types::ErrorKind::ValidationError);
        assert!(engine.store().is_empty());
    }

    #[test]
    fn test_insufficient_funds_changes_nothing() {
        let engine = engine();
        let id = setup(&engine, "10");

        let error = engine.apply_delta(delta(id, "-15.0000")).unwrap_err();
        assert!(matches!(error, LedgerError::InsufficientFunds { .. }));

        assert_eq!(engine.store().get_wallet(id).unwrap().balance, amount("10"));
        assert_eq!(engine.store().list_transactions(id, 0, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_credit_then_debit_to_exactly_zero() {
        let engine = engine();
        let id = setup(&engine, "10");

        let credit = engine
            .apply_delta(ApplyDeltaRequest {
                wallet_id: id,
                amount: "5.5000".into(),
                description: Some("pay".to_string()),
            })
            .unwrap();
        assert_eq!(credit.balance, amount("15.5"));

        let latest = &engine.store().list_transactions(id, 0, 1).unwrap()[0];
        assert_eq!(latest.id, credit.transaction_id);
        assert_eq!(latest.transaction_type, TransactionType::Credit);
        assert_eq!(latest.amount, amount("5.5"));
        assert_eq!(latest.balance, amount("15.5"));
        assert_eq!(latest.description, "pay");

        let debit = engine.apply_delta(delta(id, "-15.5000")).unwrap();
        assert_eq!(debit.balance, Amount::ZERO);

        let latest = &engine.store().list_transactions(id, 0, 1).unwrap()[0];
        assert_eq!(latest.transaction_type, TransactionType::Debit);
        assert_eq!(latest.description, "");
    }

    #[rstest]
    #[case::zero("0")]
    #[case::negative_zero("-0.0000")]
    #[case::too_precise("1.00001")]
    #[case::garbage("abc")]
    #[case::nan("NaN")]
    fn test_apply_delta_rejects_amount(#[case] raw: &str) {
        let engine = engine();
        let id = setup(&engine, "10");

        let error = engine.apply_delta(delta(id, raw)).unwrap_err();
        assert_eq!(error.kind(), crate::types::ErrorKind::ValidationError);
        assert_eq!(engine.store().get_wallet(id).unwrap().balance, amount("10"));
    }

    #[test]
    fn test_apply_delta_accepts_float_input() {
        let engine = engine();
        let id = setup(&engine, "10");

        let receipt = engine
            .apply_delta(ApplyDeltaRequest {
                wallet_id: id,
                amount: RawAmount::Number(-0.1),
                description: None,
            })
            .unwrap();
        assert_eq!(receipt.balance, amount("9.9"));
    }

    #[rstest]
    #[case::at_limit(100, true)]
    #[case::over_limit(101, false)]
    fn test_description_length(#[case] length: usize, #[case] accepted: bool) {
        let engine = engine();
        let id = setup(&engine, "10");

        let description = format!("  {}  ", "é".repeat(length));
        let result = engine.apply_delta(ApplyDeltaRequest {
            wallet_id: id,
            amount: "1".into(),
            description: Some(description),
        });

        assert_eq!(result.is_ok(), accepted);
        let expected_balance = if accepted { "11" } else { "10" };
        assert_eq!(
            engine.store().get_wallet(id).unwrap().balance,
            amount(expected_balance)
        );
    }

    #[test]
    fn test_unknown_wallet_is_not_found() {
        let engine = engine();
        let error = engine
            .apply_delta(delta(WalletId::generate(), "1"))
            .unwrap_err();
        assert!(matches!(error, LedgerError::WalletNotFound { .. }));
    }

    #[test]
    fn test_failed_record_changes_nothing() {
        let store = Arc::new(FlakyStore::default());
        let engine = LedgerEngine::new(Arc::clone(&store));
        let id = setup(&engine, "10");

        store.fail_appends.store(true, Ordering::SeqCst);
        let error = engine.apply_delta(delta(id, "-4")).unwrap_err();
        assert_eq!(error, LedgerError::storage("journal unavailable"));
        assert_eq!(store.get_wallet(id).unwrap().balance, amount("10"));
        assert_eq!(store.list_transactions(id, 0, 10).unwrap().len(), 1);

        store.fail_appends.store(false, Ordering::SeqCst);
        let receipt = engine.apply_delta(delta(id, "-4")).unwrap();
        assert_eq!(receipt.balance, amount("6"));

        let history = store.list_transactions(id, 0, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sequence, 1);
    }

    #[test]
    fn test_lock_timeouts_never_leave_partial_commits() {
        let store = Arc::new(InMemoryLedgerStore::new(Duration::from_micros(1)));
        let engine = LedgerEngine::new(Arc::clone(&store));
        let id = setup(&engine, "100");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let engine = engine.clone();
                thread::spawn(move || {
                    let mut applied = 0i64;
                    for _ in 0..500 {
                        match engine.apply_delta(delta(id, "1")) {
                            Ok(_) => applied += 1,
                            Err(error) => assert_eq!(error.kind(), ErrorKind::Timeout),
                        }
                    }
                    applied
                })
            })
            .collect();

        let applied: i64 = handles.into_iter().map(|handle| handle.join().unwrap()).sum();

        let wallet = store.get_wallet(id).unwrap();
        assert_eq!(wallet.balance.as_decimal(), rust_decimal::Decimal::from(100 + applied));

        let history = store.list_transactions(id, 0, usize::MAX).unwrap();
        assert_eq!(history.len() as i64, applied + 1);

        let report = QueryService::new(store).audit(id).unwrap();
        assert!(report.consistent, "{:?}", report);
        assert_eq!(report.records as i64, applied + 1);
    }

    #[test]
    fn test_failed_setup_record_discards_wallet() {
        let store = Arc::new(FlakyStore::default());
        let engine = LedgerEngine::new(Arc::clone(&store));

        store.fail_appends.store(true, Ordering::SeqCst);
        let error = engine
            .setup(SetupRequest {
                name: "Alice".to_string(),
                balance: Some("10".into()),
            })
            .unwrap_err();

        assert_eq!(error, LedgerError::storage("journal unavailable"));
        assert!(store.inner.is_empty());
    }

    #[test]
    fn test_undiscardable_setup_is_partial_commit() {
        let store = Arc::new(FlakyStore::default());
        let engine = LedgerEngine::new(Arc::clone(&store));

        store.fail_appends.store(true, Ordering::SeqCst);
        store.fail_discards.store(true, Ordering::SeqCst);
        let error = engine
            .setup(SetupRequest {
                name: "Alice".to_string(),
                balance: Some("10".into()),
            })
            .unwrap_err();

        assert!(matches!(error, LedgerError::PartialCommit { .. }));
        assert_eq!(store.inner.len(), 1);
    }

    #[test]
    fn test_concurrent_debits_exactly_one_succeeds() {
        let engine = engine();
        let id = setup(&engine, "10");
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let engine = engine.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    engine.apply_delta(delta(id, "-6.0000"))
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let rejections = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::InsufficientFunds { .. })))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(rejections, 1);
        assert_eq!(engine.store().get_wallet(id).unwrap().balance, amount("4"));
        assert_eq!(engine.store().list_transactions(id, 0, 10).unwrap().len(), 2);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use rust_decimal::Decimal;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn balance_never_goes_negative(
                opening in 0i64..10_000,
                cents in prop::collection::vec((-5_000i64..5_000).prop_filter("non-zero", |c| *c != 0), 1..40),
            ) {
                let engine = engine();
                let id = setup(&engine, &Decimal::new(opening, 2).to_string());
                let mut expected = opening;
                let mut recorded = 1;

                for delta_cents in cents {
                    let result = engine.apply_delta(delta(id, &Decimal::new(delta_cents, 2).to_string()));
                    if expected + delta_cents < 0 {
                        let rejected = matches!(result, Err(LedgerError::InsufficientFunds { .. }));
                        prop_assert!(rejected);
                    } else {
                        prop_assert!(result.is_ok());
                        expected += delta_cents;
                        recorded += 1;
                    }
                }

                let wallet = engine.store().get_wallet(id).unwrap();
                prop_assert!(!wallet.balance.is_negative());
                prop_assert_eq!(wallet.balance.as_decimal(), Decimal::new(expected, 2));

                let history = engine.store().list_transactions(id, 0, usize::MAX).unwrap();
                prop_assert_eq!(history.len(), recorded);
                let replayed = history
                    .iter()
                    .fold(Decimal::ZERO, |sum, record| sum + record.amount.as_decimal());
                prop_assert_eq!(replayed, Decimal::new(expected, 2));
            }
        }
    }
}
