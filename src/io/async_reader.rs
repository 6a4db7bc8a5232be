//! Asynchronous CSV reader with batch interface
//!
//! Provides batch reading of operations from a CSV source for the async
//! processing strategy.
//!
//! # Design
//!
//! The AsyncReader uses:
//! - csv-async for streaming CSV parsing
//! - futures `AsyncRead`, so tokio files are wrapped with `tokio_util::compat`
//!
//! # Architecture
//!
//! ```text
//! CSV source → AsyncReader → Batches of LedgerOperations
//!                  ↓
//!           csv_format module
//!           (OpsCsvRecord, convert_ops_record)
//! ```
//!
//! Rows that fail to parse or convert are logged with `tracing::warn!` and
//! left out of the batch.

use crate::io::csv_format::{convert_ops_record, OpsCsvRecord};
use crate::types::LedgerOperation;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;

/// Batch reader over an operations CSV source
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: u64,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a reader over `reader`, which must start with a header row
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 0,
        }
    }

    /// Read up to `batch_size` valid operations
    ///
    /// Returns an empty batch once the source is exhausted.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<LedgerOperation> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<OpsCsvRecord>();

        while batch.len() < batch_size {
            let Some(next) = records.next().await else {
                break;
            };
            self.line_num += 1;
            let line = self.line_num + 1;

            match next {
                Ok(record) => match convert_ops_record(record) {
                    Ok(operation) => batch.push(operation),
                    Err(e) => tracing::warn!(line, error = %e, "skipping operation row"),
                },
                Err(e) => tracing::warn!(line, error = %e, "skipping malformed CSV row"),
            }
        }

        batch
    }
}
