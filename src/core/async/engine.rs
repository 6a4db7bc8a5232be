//! Async facade over the ledger engine and query service
//!
//! This module provides [`AsyncLedgerEngine`], which runs every engine and
//! query call on tokio's blocking thread pool.
//!
//! # Design
//!
//! Store calls may wait on a wallet lock for up to the configured timeout, so
//! they must not run on the async worker threads. Each call is handed to
//! `tokio::task::spawn_blocking`.
//!
//! # Cancellation
//!
//! Dropping the returned future abandons the wait, never the work: a blocking
//! task that has started runs to completion, so a delta either commits with
//! its record or not at all, even if the caller has gone away.
//!
//! # Architecture
//!
//! ```text
//! AsyncLedgerEngine
//!     ├── LedgerEngine<S>   (setup / apply_delta)
//!     └── QueryService<S>   (get_wallet / list_transactions / audit)
//!           both sharing one Arc<S>
//! ```

use std::sync::Arc;

use crate::core::engine::{
    ApplyDeltaRequest, DeltaReceipt, LedgerEngine, SetupReceipt, SetupRequest,
};
use crate::core::query::{AuditReport, Page, QueryService};
use crate::core::registry::{OperationOutcome, WalletRegistry};
use crate::core::traits::LedgerStore;
use crate::types::{LedgerError, LedgerOperation, Transaction, Wallet, WalletId};

/// Ledger operations for async callers
///
/// Cloning is cheap; clones share the same store.
#[derive(Debug)]
pub struct AsyncLedgerEngine<S: LedgerStore + 'static> {
    engine: LedgerEngine<S>,
    query: QueryService<S>,
}

impl<S: LedgerStore + 'static> Clone for AsyncLedgerEngine<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            query: self.query.clone(),
        }
    }
}

impl<S: LedgerStore + 'static> AsyncLedgerEngine<S> {
    /// Create an async engine over `store`
    ///
    /// # Arguments
    ///
    /// * `store` - Arc-wrapped store shared by the engine and query service
    pub fn new(store: Arc<S>) -> Self {
        Self {
            engine: LedgerEngine::new(Arc::clone(&store)),
            query: QueryService::new(store),
        }
    }

    /// The synchronous engine behind this facade
    pub fn engine(&self) -> &LedgerEngine<S> {
        &self.engine
    }

    /// The query service behind this facade
    pub fn query(&self) -> &QueryService<S> {
        &self.query
    }

    /// Create a wallet, see [`LedgerEngine::setup`]
    pub async fn setup(&self, request: SetupRequest) -> Result<SetupReceipt, LedgerError> {
        self.blocking(move |ledger| ledger.engine.setup(request))
            .await
    }

    /// Apply a signed delta, see [`LedgerEngine::apply_delta`]
    pub async fn apply_delta(
        &self,
        request: ApplyDeltaRequest,
    ) -> Result<DeltaReceipt, LedgerError> {
        self.blocking(move |ledger| ledger.engine.apply_delta(request))
            .await
    }

    pub async fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet, LedgerError> {
        self.blocking(move |ledger| ledger.query.get_wallet(wallet_id))
            .await
    }

    pub async fn list_transactions(
        &self,
        wallet_id: WalletId,
        page: Page,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.blocking(move |ledger| ledger.query.list_transactions(wallet_id, page))
            .await
    }

    pub async fn audit(&self, wallet_id: WalletId) -> Result<AuditReport, LedgerError> {
        self.blocking(move |ledger| ledger.query.audit(wallet_id))
            .await
    }

    /// Apply one labelled batch operation, see [`WalletRegistry::apply`]
    pub async fn apply_operation(
        &self,
        registry: Arc<WalletRegistry>,
        operation: LedgerOperation,
    ) -> Result<OperationOutcome, LedgerError> {
        self.blocking(move |ledger| registry.apply(&ledger.engine, operation))
            .await
    }

    /// Run `f` on the blocking pool with a clone of this engine
    ///
    /// # Errors
    ///
    /// Whatever `f` returns, or `Storage` if the blocking task panicked.
    async fn blocking<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&Self) -> Result<T, LedgerError> + Send + 'static,
        T: Send + 'static,
    {
        let ledger = self.clone();
        tokio::task::spawn_blocking(move || f(&ledger))
            .await
            .map_err(|e| LedgerError::storage(format!("ledger task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::InMemoryLedgerStore;
    use crate::types::Amount;
    use std::time::Duration;

    fn amount(raw: &str) -> Amount {
        Amount::parse(raw).unwrap()
    }

    fn ledger() -> AsyncLedgerEngine<InMemoryLedgerStore> {
        AsyncLedgerEngine::new(Arc::new(InMemoryLedgerStore::default()))
    }

    async fn alice(ledger: &AsyncLedgerEngine<InMemoryLedgerStore>, balance: &str) -> WalletId {
        ledger
            .setup(SetupRequest {
                name: "Alice".to_string(),
                balance: Some(balance.into()),
            })
            .await
            .unwrap()
            .id
    }

    fn debit(wallet_id: WalletId, raw: &str) -> ApplyDeltaRequest {
        ApplyDeltaRequest {
            wallet_id,
            amount: raw.into(),
            description: None,
        }
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AsyncLedgerEngine<InMemoryLedgerStore>>();
    }

    #[tokio::test]
    async fn test_setup_and_query() {
        let ledger = ledger();
        let id = alice(&ledger, "10").await;

        let receipt = ledger
            .apply_delta(ApplyDeltaRequest {
                wallet_id: id,
                amount: "5.5".into(),
                description: Some("pay".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(receipt.balance, amount("15.5"));

        let wallet = ledger.get_wallet(id).await.unwrap();
        assert_eq!(wallet.balance, amount("15.5"));

        let listed = ledger.list_transactions(id, Page::default()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, receipt.transaction_id);

        assert!(ledger.audit(id).await.unwrap().consistent);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_never_overdraw() {
        let ledger = ledger();
        let id = alice(&ledger, "10").await;

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.apply_delta(debit(id, "-1")).await })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(error) => assert!(matches!(error, LedgerError::InsufficientFunds { .. })),
            }
        }

        assert_eq!(successes, 10);
        assert_eq!(ledger.get_wallet(id).await.unwrap().balance, Amount::ZERO);
        let report = ledger.audit(id).await.unwrap();
        assert!(report.consistent);
        assert_eq!(report.records, 11);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_future_still_commits() {
        let ledger = ledger();
        let id = alice(&ledger, "10").await;

        let pending = ledger.apply_delta(debit(id, "-4"));
        // Give up almost immediately; the blocking task keeps running.
        let _ = tokio::time::timeout(Duration::from_nanos(1), pending).await;

        let mut report = ledger.audit(id).await.unwrap();
        for _ in 0..200 {
            if report.records == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            report = ledger.audit(id).await.unwrap();
        }

        assert_eq!(report.records, 2);
        assert!(report.consistent);
        assert_eq!(report.current_balance, amount("6"));
    }
}
