//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over operations from a CSV file.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Iterator Interface
//!
//! SyncReader implements the Iterator trait, yielding
//! `Result<LedgerOperation, LedgerError>` for each CSV row:
//!
//! ```no_run
//! use wallet_ledger::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("operations.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(operation) => println!("Applying: {:?}", operation),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual row errors are yielded as Err variants carrying the line number
//!
//! Rows are read one at a time; the file is never loaded into memory whole.

use crate::io::csv_format::{convert_ops_record, OpsCsvRecord};
use crate::types::{LedgerError, LedgerOperation};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

/// Streaming reader over an operations CSV file
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: u64,
}

impl SyncReader {
    /// Open an operations file
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be opened.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let file = File::open(path).map_err(|e| LedgerError::Io {
            message: format!("Failed to open file '{}': {}", path.display(), e),
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 0,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<LedgerOperation, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.reader.deserialize::<OpsCsvRecord>().next()?;
        self.line_num += 1;

        // Line 1 is the header
        let result = match next {
            Ok(record) => convert_ops_record(record).map_err(|e| LedgerError::Parse {
                line: Some(self.line_num + 1),
                message: e.to_string(),
            }),
            Err(e) => Err(LedgerError::from(e)),
        };

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_sync_reader_fails_on_missing_file() {
        let result = SyncReader::new(Path::new("nonexistent.csv"));
        match result {
            Err(LedgerError::Io { message }) => assert!(message.contains("Failed to open file")),
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_sync_reader_yields_operations_in_order() {
        let file = create_temp_csv(
            "op,wallet,name,amount,description\n\
             setup,alice,Alice,10,\n\
             transact,alice,,-2.5,rent\n",
        );

        let operations: Vec<_> = SyncReader::new(file.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            operations,
            vec![
                LedgerOperation::Setup {
                    wallet: "alice".into(),
                    name: "Alice".into(),
                    balance: Some("10".into()),
                },
                LedgerOperation::Transact {
                    wallet: "alice".into(),
                    amount: "-2.5".into(),
                    description: Some("rent".into()),
                },
            ]
        );
    }

    #[test]
    fn test_sync_reader_accepts_short_rows() {
        let file = create_temp_csv("op,wallet,name,amount,description\nsetup,bob,Bob\n");

        let operations: Vec<_> = SyncReader::new(file.path()).unwrap().collect();
        assert_eq!(operations.len(), 1);
        assert_eq!(
            operations[0].as_ref().unwrap(),
            &LedgerOperation::Setup {
                wallet: "bob".into(),
                name: "Bob".into(),
                balance: None,
            }
        );
    }

    #[test]
    fn test_sync_reader_continues_after_bad_row() {
        let file = create_temp_csv(
            "op,wallet,name,amount,description\n\
             setup,alice,Alice,10,\n\
             transfer,alice,,1,\n\
             transact,alice,,1,\n",
        );

        let results: Vec<_> = SyncReader::new(file.path()).unwrap().collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(LedgerError::Parse { line: Some(3), .. })
        ));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_sync_reader_trims_whitespace() {
        let file = create_temp_csv("op,wallet,name,amount,description\n  setup  ,  carol , Carol ,  5 ,\n");

        let operations: Vec<_> = SyncReader::new(file.path()).unwrap().collect();
        assert_eq!(
            operations[0].as_ref().unwrap(),
            &LedgerOperation::Setup {
                wallet: "carol".into(),
                name: "Carol".into(),
                balance: Some("5".into()),
            }
        );
    }

    #[test]
    fn test_sync_reader_empty_file() {
        let file = create_temp_csv("op,wallet,name,amount,description\n");
        assert_eq!(SyncReader::new(file.path()).unwrap().count(), 0);
    }
}
