//! I/O module
//!
//! Handles CSV input and output, and durable storage.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (operation rows, summaries, history export)
//! - `sync_reader` - Synchronous operations reader with iterator interface
//! - `async_reader` - Asynchronous operations reader with batch reading interface
//! - `journal` - Journal-backed ledger store

pub mod async_reader;
pub mod csv_format;
pub mod journal;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{
    convert_ops_record, write_transactions_csv, write_wallets_csv, OpsCsvRecord, WalletSummary,
};
pub use journal::{JournalOptions, JournalStore};
pub use sync_reader::SyncReader;
