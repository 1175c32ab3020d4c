//! Data quality accounting per chunk and per run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StagingError;
use super::store::IngestStore;

/// Counters for one chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkQuality {
    /// Raw rows in the chunk
    pub total: u64,
    /// Records retained after normalization and deduplication
    pub valid: u64,
    /// Rows rejected by the normalizer
    pub invalid: u64,
    /// Retained records with at least one null tracked field
    pub null: u64,
    /// Records dropped as in-chunk duplicates
    pub duplicate: u64,
    /// Field values that could not be coerced and were stored as null
    pub coercion_failures: u64,
}

impl ChunkQuality {
    /// Rows that did not make it into the output
    pub fn rejected(&self) -> u64 {
        self.invalid + self.duplicate
    }
}

/// Run-level quality summary, one row in `data_quality_metrics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub batch_id: String,
    pub total_records: i64,
    pub valid_records: i64,
    pub invalid_records: i64,
    pub null_records: i64,
    pub duplicate_records: i64,
    pub processing_date: DateTime<Utc>,
}

/// Accumulates chunk counters over a run and persists the summary once
#[derive(Debug)]
pub struct QualityAggregator {
    batch_id: String,
    totals: ChunkQuality,
    persisted: bool,
}

impl QualityAggregator {
    /// Create an aggregator for one run
    pub fn new(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            totals: ChunkQuality::default(),
            persisted: false,
        }
    }

    /// Add the counters of one successfully written chunk
    pub fn merge(&mut self, chunk: &ChunkQuality) {
        let t = &mut self.totals;
        t.total += chunk.total;
        t.valid += chunk.valid;
        t.invalid += chunk.invalid;
        t.null += chunk.null;
        t.duplicate += chunk.duplicate;
        t.coercion_failures += chunk.coercion_failures;
    }

    /// Running totals
    pub fn totals(&self) -> &ChunkQuality {
        &self.totals
    }

    /// Whether the summary has already been written
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Snapshot the totals as a metrics row
    pub fn metrics(&self) -> QualityMetrics {
        let t = &self.totals;
        QualityMetrics {
            batch_id: self.batch_id.clone(),
            total_records: t.total as i64,
            valid_records: t.valid as i64,
            invalid_records: t.invalid as i64,
            null_records: t.null as i64,
            duplicate_records: t.duplicate as i64,
            processing_date: Utc::now(),
        }
    }

    /// Write the summary. A second call is a no-op returning `None`.
    pub fn persist<S: IngestStore + ?Sized>(
        &mut self,
        store: &mut S,
    ) -> Result<Option<i64>, StagingError> {
        if self.persisted {
            return Ok(None);
        }

        let id = store.insert_quality_metrics(&self.metrics())?;
        self.persisted = true;
        tracing::debug!(batch_id = %self.batch_id, metrics_id = id, "Quality metrics persisted");
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::store::MemoryStore;

    #[test]
    fn test_merge_sums_counters() {
        let mut agg = QualityAggregator::new("b-1");
        agg.merge(&ChunkQuality {
            total: 3,
            valid: 2,
            invalid: 0,
            null: 1,
            duplicate: 1,
            coercion_failures: 0,
        });
        agg.merge(&ChunkQuality {
            total: 2,
            valid: 1,
            invalid: 1,
            null: 0,
            duplicate: 0,
            coercion_failures: 2,
        });

        let totals = agg.totals();
        assert_eq!(totals.total, 5);
        assert_eq!(totals.valid, 3);
        assert_eq!(totals.rejected(), 2);
        assert_eq!(totals.coercion_failures, 2);
        assert_eq!(totals.total, totals.valid + totals.rejected());
    }

    #[test]
    fn test_persist_once() {
        let mut store = MemoryStore::default();
        let mut agg = QualityAggregator::new("b-1");
        agg.merge(&ChunkQuality {
            total: 1,
            valid: 1,
            ..Default::default()
        });

        assert!(agg.persist(&mut store).unwrap().is_some());
        assert!(agg.is_persisted());
        assert_eq!(agg.persist(&mut store).unwrap(), None);

        assert_eq!(store.metrics.len(), 1);
        assert_eq!(store.metrics[0].batch_id, "b-1");
        assert_eq!(store.metrics[0].valid_records, 1);
    }

    #[test]
    fn test_empty_run_metrics_are_zero() {
        let metrics = QualityAggregator::new("b-0").metrics();
        assert_eq!(metrics.total_records, 0);
        assert_eq!(metrics.valid_records, 0);
        assert_eq!(metrics.null_records, 0);
        assert_eq!(metrics.duplicate_records, 0);
    }
}
