//! Sub-batched, transactional writes of a chunk

use tracing::{debug, error};

use super::error::IngestError;
use super::record::CanonicalRecord;
use super::store::IngestStore;

/// What a successful chunk write committed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Rows committed
    pub rows_written: usize,
    /// Transactions committed
    pub sub_batches: usize,
}

/// Writes a chunk in sub-batches of at most `batch_size` rows, one transaction each
#[derive(Debug, Clone)]
pub struct BatchWriter {
    batch_size: usize,
}

impl BatchWriter {
    /// Create a writer. A zero size is treated as one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Rows per transaction
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Write records in order.
    ///
    /// Stops at the first failing sub-batch. Earlier sub-batches stay committed and
    /// are reported in [`IngestError::ChunkWrite`]; later ones are never attempted.
    pub fn write_chunk<S: IngestStore + ?Sized>(
        &self,
        store: &mut S,
        batch_id: &str,
        records: &[CanonicalRecord],
    ) -> Result<WriteSummary, IngestError> {
        let mut summary = WriteSummary::default();

        for sub_batch in records.chunks(self.batch_size) {
            match store.insert_records(sub_batch) {
                Ok(written) => {
                    summary.rows_written += written;
                    summary.sub_batches += 1;
                    debug!(batch_id, rows = written, "Sub-batch committed");
                }
                Err(source) => {
                    error!(
                        batch_id,
                        attempted = sub_batch.len(),
                        committed = summary.rows_written,
                        error = %source,
                        "Sub-batch rolled back"
                    );
                    return Err(IngestError::ChunkWrite {
                        batch_id: batch_id.to_string(),
                        attempted: sub_batch.len(),
                        committed: summary.rows_written,
                        source,
                    });
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::store::MemoryStore;

    fn records(n: usize) -> Vec<CanonicalRecord> {
        (0..n)
            .map(|i| {
                let mut r = CanonicalRecord::new("f.csv", "b");
                r.product_id = Some(i as i64);
                r
            })
            .collect()
    }

    #[test]
    fn test_writes_in_sub_batches() {
        let mut store = MemoryStore::default();
        let summary = BatchWriter::new(2)
            .write_chunk(&mut store, "b", &records(5))
            .unwrap();

        assert_eq!(summary.rows_written, 5);
        assert_eq!(summary.sub_batches, 3);
        let ids: Vec<Option<i64>> = store.records.iter().map(|r| r.product_id).collect();
        assert_eq!(ids, (0..5).map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_chunk_writes_nothing() {
        let mut store = MemoryStore::default();
        let summary = BatchWriter::new(10).write_chunk(&mut store, "b", &[]).unwrap();
        assert_eq!(summary, WriteSummary::default());
    }

    #[test]
    fn test_failure_keeps_earlier_sub_batches_only() {
        let mut store = MemoryStore::default();
        let mut chunk = records(6);
        chunk[3].number_of_reviews = Some(-1);

        let err = BatchWriter::new(2)
            .write_chunk(&mut store, "b-7", &chunk)
            .unwrap_err();

        match err {
            IngestError::ChunkWrite {
                batch_id,
                attempted,
                committed,
                ..
            } => {
                assert_eq!(batch_id, "b-7");
                assert_eq!(attempted, 2);
                assert_eq!(committed, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Only the first sub-batch landed; the third was never attempted
        assert_eq!(store.records.len(), 2);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        assert_eq!(BatchWriter::new(0).batch_size(), 1);
    }
}
