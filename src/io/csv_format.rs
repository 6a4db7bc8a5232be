//! CSV format handling for operation files and ledger output
//!
//! This module centralizes all CSV format concerns, providing:
//! - OpsCsvRecord structure for deserializing operation rows
//! - Conversion from operation rows to domain types
//! - Wallet summary output after a batch run
//! - Transaction history export
//!
//! Conversion is structural only: it checks that the row names a known
//! operation and carries the columns that operation needs. Amounts, names and
//! descriptions are validated by the engine.

use crate::types::{Amount, LedgerError, LedgerOperation, Transaction, WalletLabel};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::io::Write;

/// Raw CSV row of an operations file
///
/// Columns: `op,wallet,name,amount,description`. Columns an operation does
/// not use may be empty or missing.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OpsCsvRecord {
    pub op: String,
    pub wallet: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Final state of one labelled wallet after a batch run
#[derive(Debug, Clone, PartialEq)]
pub struct WalletSummary {
    pub label: WalletLabel,
    pub name: String,
    pub balance: Amount,

    /// Number of transaction records, the setup record included
    pub transactions: usize,
}

/// Convert an operations CSV row into a [`LedgerOperation`]
///
/// # Arguments
///
/// * `record` - The raw CSV row
///
/// # Returns
///
/// * `Ok(LedgerOperation)` - If the row is structurally valid
/// * `Err(LedgerError::Validation)` - If the operation is unknown, the wallet
///   label is empty, a setup has no name or a transact has no amount
pub fn convert_ops_record(record: OpsCsvRecord) -> Result<LedgerOperation, LedgerError> {
    let wallet = record.wallet.trim().to_string();
    if wallet.is_empty() {
        return Err(LedgerError::validation("wallet", "label must not be empty"));
    }

    let amount = non_empty(record.amount);
    let description = non_empty(record.description);

    match record.op.trim().to_lowercase().as_str() {
        "setup" => {
            let name = non_empty(record.name).ok_or_else(|| {
                LedgerError::validation("name", format!("setup of '{}' requires a name", wallet))
            })?;
            Ok(LedgerOperation::Setup {
                wallet,
                name,
                balance: amount,
            })
        }
        "transact" => {
            let amount = amount.ok_or_else(|| {
                LedgerError::validation(
                    "amount",
                    format!("transact on '{}' requires an amount", wallet),
                )
            })?;
            Ok(LedgerOperation::Transact {
                wallet,
                amount,
                description,
            })
        }
        other => Err(LedgerError::validation(
            "op",
            format!("unknown operation '{}'", other),
        )),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Render a timestamp the way every CSV output of the crate does
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Write wallet summaries as CSV, sorted by label
///
/// # Arguments
///
/// * `summaries` - Wallet states to write
/// * `output` - Destination writer
///
/// # Errors
///
/// Returns `Io` if the output cannot be written.
pub fn write_wallets_csv(
    summaries: &[WalletSummary],
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["wallet", "name", "balance", "transactions"])?;

    let mut sorted = summaries.to_vec();
    sorted.sort_by(|a, b| a.label.cmp(&b.label));

    for summary in sorted {
        writer.write_record(&[
            summary.label,
            summary.name,
            summary.balance.to_string(),
            summary.transactions.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Export a wallet's history as CSV in the order given
///
/// Columns: `id,date,type,amount,balance,description`.
pub fn write_transactions_csv(
    records: &[Transaction],
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["id", "date", "type", "amount", "balance", "description"])?;

    for record in records {
        writer.write_record(&[
            record.id.to_string(),
            format_date(&record.date),
            record.transaction_type.to_string(),
            record.amount.to_string(),
            record.balance.to_string(),
            record.description.clone(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
