//! Durable journal-backed ledger store
//!
//! [`JournalStore`] wraps an [`InMemoryLedgerStore`] and appends every
//! durable fact to a CSV journal file before it becomes visible in memory:
//!
//! - `wallet` rows when a wallet is created
//! - `transaction` rows when a delta commits or a setup record is appended
//! - `discard` rows when an orphan wallet is removed
//!
//! Balances are not journaled. A wallet's balance is the balance of its
//! latest transaction record. A delta's row is written under the wallet lock
//! before the new balance is visible, so the file's per-wallet order is the
//! commit order.
//!
//! # Opening
//!
//! [`JournalStore::open`] replays the file and verifies each wallet's history
//! (contiguous sequences starting at the setup record, each balance equal to
//! the running sum of amounts). Any unparseable row or inconsistent history
//! fails the open with `Storage`. A wallet row without any transaction is an
//! orphan left by an interrupted setup and is skipped with a warning.
//!
//! A final row without its line terminator was cut short by a crash during
//! the write that produced it. That write never became visible, so the
//! partial row is truncated away with a warning before replay.
//!
//! # Failure handling
//!
//! A failed journal write leaves the in-memory state untouched and returns
//! `Storage`. The writer is then retired: every later write fails too, since
//! the file may end in a partial row.

use crate::core::store::InMemoryLedgerStore;
use crate::core::traits::LedgerStore;
use crate::config::{LedgerConfig, DEFAULT_LOCK_TIMEOUT};
use crate::types::{
    Amount, LedgerError, Transaction, TransactionId, TransactionType, Wallet,
    WalletId,
};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Settings for [`JournalStore::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalOptions {
    /// Upper bound on waiting for a wallet lock
    pub lock_timeout: Duration,

    /// Fsync the journal after every write
    pub sync_writes: bool,
}

impl Default for JournalOptions {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            sync_writes: false,
        }
    }
}

impl From<&LedgerConfig> for JournalOptions {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            lock_timeout: config.lock_timeout,
            sync_writes: config.sync_writes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RowKind {
    Wallet,
    Transaction,
    Discard,
}

/// One line of the journal file
///
/// Columns a row kind does not use are left empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct JournalRow {
    kind: RowKind,
    wallet_id: String,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    balance: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    sequence: Option<u64>,
}

impl JournalRow {
    fn wallet(wallet: &Wallet) -> Self {
        JournalRow {
            kind: RowKind::Wallet,
            wallet_id: wallet.id.to_string(),
            transaction_id: None,
            name: Some(wallet.name.clone()),
            amount: None,
            balance: Some(wallet.balance.to_string()),
            description: None,
            date: Some(format_timestamp(&wallet.created_at)),
            sequence: None,
        }
    }

    fn transaction(record: &Transaction) -> Self {
        JournalRow {
            kind: RowKind::Transaction,
            wallet_id: record.wallet_id.to_string(),
            transaction_id: Some(record.id.to_string()),
            name: None,
            amount: Some(record.amount.to_string()),
            balance: Some(record.balance.to_string()),
            description: Some(record.description.clone()),
            date: Some(format_timestamp(&record.date)),
            sequence: Some(record.sequence),
        }
    }

    fn discard(wallet_id: WalletId) -> Self {
        JournalRow {
            kind: RowKind::Discard,
            wallet_id: wallet_id.to_string(),
            transaction_id: None,
            name: None,
            amount: None,
            balance: None,
            description: None,
            date: None,
            sequence: None,
        }
    }

    fn wallet_id(&self) -> Result<WalletId, String> {
        WalletId::from_str(&self.wallet_id).map_err(|e| e.to_string())
    }

    fn to_wallet(&self) -> Result<Wallet, String> {
        Ok(Wallet {
            id: self.wallet_id()?,
            balance: parse_amount(required(&self.balance, "balance")?)?,
            name: required(&self.name, "name")?.to_string(),
            created_at: parse_timestamp(required(&self.date, "date")?)?,
        })
    }

    fn to_transaction(&self) -> Result<Transaction, String> {
        let id = Uuid::parse_str(required(&self.transaction_id, "transaction_id")?)
            .map_err(|e| format!("invalid transaction_id: {}", e))?;
        let amount = parse_amount(required(&self.amount, "amount")?)?;

        Ok(Transaction {
            id: TransactionId::from_uuid(id),
            wallet_id: self.wallet_id()?,
            amount,
            balance: parse_amount(required(&self.balance, "balance")?)?,
            description: self.description.clone().unwrap_or_default(),
            date: parse_timestamp(required(&self.date, "date")?)?,
            transaction_type: TransactionType::from_delta(amount),
            sequence: self.sequence.ok_or("missing sequence")?,
        })
    }
}

fn required<'a>(value: &'a Option<String>, column: &str) -> Result<&'a str, String> {
    value
        .as_deref()
        .ok_or_else(|| format!("missing {}", column))
}

fn parse_amount(raw: &str) -> Result<Amount, String> {
    Amount::parse_exact(raw).map_err(|e| e.to_string())
}

fn format_timestamp(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| format!("invalid date '{}': {}", raw, e))
}

fn storage_error(context: &str, error: impl std::fmt::Display) -> LedgerError {
    LedgerError::storage(format!("{}: {}", context, error))
}

/// Ledger store persisted to an append-only CSV journal
#[derive(Debug)]
pub struct JournalStore {
    inner: InMemoryLedgerStore,
    writer: Mutex<Option<csv::Writer<File>>>,
    path: PathBuf,
    sync_writes: bool,
}

impl JournalStore {
    /// Open (or create) a journal and rebuild the ledger from it
    ///
    /// # Arguments
    ///
    /// * `path` - Journal file, created if missing
    /// * `options` - Lock timeout and fsync behaviour
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the file cannot be opened, a row cannot be parsed,
    /// or a wallet's history is not replay consistent.
    pub fn open(path: impl AsRef<Path>, options: JournalOptions) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| storage_error(&format!("cannot open journal '{}'", path.display()), e))?;

        trim_incomplete_tail(&file, &path)?;

        let is_empty = file
            .metadata()
            .map_err(|e| storage_error("cannot inspect journal", e))?
            .len()
            == 0;

        let inner = InMemoryLedgerStore::new(options.lock_timeout);
        if !is_empty {
            replay(&path, &inner)?;
        }

        let writer = csv::WriterBuilder::new()
            .has_headers(is_empty)
            .from_writer(file);

        info!(
            journal = %path.display(),
            wallets = inner.len(),
            "journal opened"
        );

        Ok(Self {
            inner,
            writer: Mutex::new(Some(writer)),
            path,
            sync_writes: options.sync_writes,
        })
    }

    /// Flush and release the journal
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the final flush or sync fails.
    pub fn close(self) -> Result<(), LedgerError> {
        let Some(mut writer) = self.writer.lock().take() else {
            return Ok(());
        };

        writer
            .flush()
            .map_err(|e| storage_error("journal flush failed", e))?;
        if self.sync_writes {
            writer
                .get_ref()
                .sync_all()
                .map_err(|e| storage_error("journal sync failed", e))?;
        }

        debug!(journal = %self.path.display(), "journal closed");
        Ok(())
    }

    /// Location of the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of wallets held
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Identifiers of every wallet, in no particular order
    pub fn wallet_ids(&self) -> Vec<WalletId> {
        self.inner.wallet_ids()
    }

    /// Append one row and make it durable
    ///
    /// On failure the writer is retired so a partial row is never followed by
    /// more data.
    fn write_row(&self, row: &JournalRow) -> Result<(), LedgerError> {
        let mut guard = self.writer.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| LedgerError::storage("journal is closed"))?;

        let result = writer
            .serialize(row)
            .map_err(|e| storage_error("journal write failed", e))
            .and_then(|()| {
                writer
                    .flush()
                    .map_err(|e| storage_error("journal flush failed", e))
            })
            .and_then(|()| {
                if self.sync_writes {
                    writer
                        .get_ref()
                        .sync_data()
                        .map_err(|e| storage_error("journal sync failed", e))
                } else {
                    Ok(())
                }
            });

        if let Err(error) = &result {
            warn!(journal = %self.path.display(), %error, "journal retired after failed write");
            *guard = None;
        }

        result
    }
}

impl Drop for JournalStore {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.get_mut().as_mut() {
            if let Err(error) = writer.flush() {
                warn!(journal = %self.path.display(), %error, "journal flush on drop failed");
            }
        }
    }
}

impl LedgerStore for JournalStore {
    fn create_wallet(&self, name: &str, initial_balance: Amount) -> Result<Wallet, LedgerError> {
        self.inner
            .create_wallet_with(name, initial_balance, |wallet| {
                self.write_row(&JournalRow::wallet(wallet))
            })
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
            .apply_delta_with(wallet_id, delta, description, |record| {
                self.write_row(&JournalRow::transaction(record))
            })
    }

    fn append_transaction(&self, record: Transaction) -> Result<TransactionId, LedgerError> {
        self.inner.append_transaction_with(record, |record| {
            self.write_row(&JournalRow::transaction(record))
        })
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
        self.inner.discard_wallet_with(wallet_id, |wallet_id| {
            self.write_row(&JournalRow::discard(wallet_id))
        })
    }
}

/// Cut off a final row that lacks its line terminator
fn trim_incomplete_tail(file: &File, path: &Path) -> Result<(), LedgerError> {
    let length = file
        .metadata()
        .map_err(|e| storage_error("cannot inspect journal", e))?
        .len();
    if length == 0 {
        return Ok(());
    }

    let mut reader = file;
    let mut last = [0u8; 1];
    reader
        .seek(SeekFrom::End(-1))
        .and_then(|_| reader.read_exact(&mut last))
        .map_err(|e| storage_error("cannot read journal", e))?;
    if last[0] == b'\n' {
        return Ok(());
    }

    reader
        .seek(SeekFrom::Start(0))
        .map_err(|e| storage_error("cannot read journal", e))?;
    let mut rows = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut record = csv::ByteRecord::new();
    let mut complete = 0;
    loop {
        let start = rows.position().byte();
        let more = rows
            .read_byte_record(&mut record)
            .map_err(|e| storage_error("cannot read journal", e))?;
        if !more {
            break;
        }
        complete = start;
    }

    warn!(
        journal = %path.display(),
        dropped_bytes = length - complete,
        "truncating incomplete final journal row"
    );
    file.set_len(complete)
        .map_err(|e| storage_error("cannot truncate journal", e))
}

/// Read every row of the journal and restore the wallets it describes
fn replay(path: &Path, store: &InMemoryLedgerStore) -> Result<(), LedgerError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| storage_error("cannot read journal", e))?;

    let mut wallets: HashMap<WalletId, (Wallet, Vec<Transaction>)> = HashMap::new();

    for (index, row) in reader.deserialize::<JournalRow>().enumerate() {
        // Line 1 is the header
        let line = index + 2;
        let corrupt = |message: String| {
            LedgerError::storage(format!("journal line {}: {}", line, message))
        };

        let row = row.map_err(|e| corrupt(e.to_string()))?;
        match row.kind {
            RowKind::Wallet => {
                let wallet = row.to_wallet().map_err(corrupt)?;
                if wallets.contains_key(&wallet.id) {
                    return Err(corrupt(format!("wallet {} created twice", wallet.id)));
                }
                wallets.insert(wallet.id, (wallet, Vec::new()));
            }
            RowKind::Transaction => {
                let record = row.to_transaction().map_err(corrupt)?;
                let (_, history) = wallets.get_mut(&record.wallet_id).ok_or_else(|| {
                    corrupt(format!("transaction for unknown wallet {}", record.wallet_id))
                })?;
                history.push(record);
            }
            RowKind::Discard => {
                let wallet_id = row.wallet_id().map_err(corrupt)?;
                if wallets.remove(&wallet_id).is_none() {
                    return Err(corrupt(format!("discard of unknown wallet {}", wallet_id)));
                }
            }
        }
    }

    for (wallet_id, (wallet, mut history)) in wallets {
        if history.is_empty() {
            warn!(wallet = %wallet_id, "skipping wallet without a setup record");
            continue;
        }

        history.sort_by_key(|record| record.sequence);
        verify_history(&wallet, &history)?;
        store.restore(wallet, history);
    }

    Ok(())
}

/// Check that a wallet's records form one unbroken, replay-consistent chain
fn verify_history(wallet: &Wallet, history: &[Transaction]) -> Result<(), LedgerError> {
    let inconsistent = |message: String| {
        LedgerError::storage(format!("wallet {} is inconsistent: {}", wallet.id, message))
    };

    let mut running = Amount::ZERO;
    for (expected_sequence, record) in (0u64..).zip(history) {
        if record.sequence != expected_sequence {
            return Err(inconsistent(format!(
                "expected sequence {}, found {}",
                expected_sequence, record.sequence
            )));
        }

        running = running
            .checked_add(record.amount)
            .ok_or_else(|| inconsistent("balance overflow".to_string()))?;
        if running != record.balance {
            return Err(inconsistent(format!(
                "transaction {} records balance {} but history sums to {}",
                record.id, record.balance, running
            )));
        }
    }

    if history[0].balance != wallet.balance {
        return Err(inconsistent(format!(
            "setup record balance {} differs from opening balance {}",
            history[0].balance, wallet.balance
        )));
    }

    Ok(())
}
