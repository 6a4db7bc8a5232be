//! Wallet label registry for batch operations
//!
//! Operations files refer to wallets by caller-chosen labels because wallet
//! identities are only known once a setup has run. [`WalletRegistry`] binds
//! each label to the [`WalletId`] its setup produced and resolves labels for
//! later transact rows.
//!
//! The registry is shared between concurrently running partitions (one per
//! label), so it is backed by a `DashMap`.

use crate::core::engine::{
    ApplyDeltaRequest, DeltaReceipt, LedgerEngine, SetupReceipt, SetupRequest,
};
use crate::core::traits::LedgerStore;
use crate::types::{LedgerError, LedgerOperation, RawAmount, WalletId, WalletLabel};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// What a successfully applied operation produced
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Setup(SetupReceipt),
    Delta(DeltaReceipt),
}

/// Label to wallet bindings for one operations file
#[derive(Debug, Default)]
pub struct WalletRegistry {
    labels: DashMap<WalletLabel, WalletId>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wallet bound to `label`
    ///
    /// # Errors
    ///
    /// Returns `Validation` if no setup has bound the label yet.
    pub fn resolve(&self, label: &str) -> Result<WalletId, LedgerError> {
        self.labels
            .get(label)
            .map(|entry| *entry.value())
            .ok_or_else(|| {
                LedgerError::validation("wallet", format!("label '{}' has not been set up", label))
            })
    }

    /// Bind `label` to a freshly created wallet
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the label is already bound.
    pub fn bind(&self, label: &str, wallet_id: WalletId) -> Result<(), LedgerError> {
        match self.labels.entry(label.to_string()) {
            Entry::Occupied(_) => Err(already_bound(label)),
            Entry::Vacant(slot) => {
                slot.insert(wallet_id);
                Ok(())
            }
        }
    }

    /// All bindings, sorted by label
    pub fn entries(&self) -> Vec<(WalletLabel, WalletId)> {
        let mut entries: Vec<_> = self
            .labels
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        entries.sort();
        entries
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Apply one operation through `engine`, resolving or binding its label
    ///
    /// A setup for a label that is already bound is rejected before any
    /// wallet is created.
    pub fn apply<S: LedgerStore>(
        &self,
        engine: &LedgerEngine<S>,
        operation: LedgerOperation,
    ) -> Result<OperationOutcome, LedgerError> {
        match operation {
            LedgerOperation::Setup {
                wallet,
                name,
                balance,
            } => {
                if self.labels.contains_key(&wallet) {
                    return Err(already_bound(&wallet));
                }

                let receipt = engine.setup(SetupRequest {
                    name,
                    balance: balance.map(RawAmount::Text),
                })?;
                self.bind(&wallet, receipt.id)?;
                Ok(OperationOutcome::Setup(receipt))
            }
            LedgerOperation::Transact {
                wallet,
                amount,
                description,
            } => {
                let wallet_id = self.resolve(&wallet)?;
                let receipt = engine.apply_delta(ApplyDeltaRequest {
                    wallet_id,
                    amount: RawAmount::Text(amount),
                    description,
                })?;
                Ok(OperationOutcome::Delta(receipt))
            }
        }
    }
}

fn already_bound(label: &str) -> LedgerError {
    LedgerError::validation("wallet", format!("label '{}' is already set up", label))
}
