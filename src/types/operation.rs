//! Batch operation records
//!
//! An operations file drives the engine from the command line. Each row is a
//! setup or a transact against a wallet *label* chosen by the file's author;
//! the label is bound to a real [`WalletId`](super::WalletId) when its setup
//! row is applied.

/// Caller-chosen name for a wallet inside one operations file
pub type WalletLabel = String;

/// One row of an operations file
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOperation {
    /// Create a wallet and bind it to `wallet`
    Setup {
        wallet: WalletLabel,
        name: String,
        /// Initial balance text, absent means zero
        balance: Option<String>,
    },

    /// Apply a signed delta to the wallet bound to `wallet`
    Transact {
        wallet: WalletLabel,
        amount: String,
        description: Option<String>,
    },
}

impl LedgerOperation {
    /// Label of the wallet this operation targets
    pub fn wallet(&self) -> &str {
        match self {
            LedgerOperation::Setup { wallet, .. } | LedgerOperation::Transact { wallet, .. } => {
                wallet
            }
        }
    }

    /// Short verb used in logs
    pub fn verb(&self) -> &'static str {
        match self {
            LedgerOperation::Setup { .. } => "setup",
            LedgerOperation::Transact { .. } => "transact",
        }
    }
}
