//! Persistence seam between the pipeline and the database
//!
//! The pipeline only talks to an [`IngestStore`]. [`StagingDb`](super::db::StagingDb)
//! is the DuckDB implementation; [`MemoryStore`] keeps everything in vectors.

use super::error::StagingError;
use super::quality::QualityMetrics;
use super::record::CanonicalRecord;
use super::run::RunRecord;

/// Everything the pipeline writes
pub trait IngestStore {
    /// Make sure the target tables exist before the first write
    fn prepare_schema(&mut self, _create_missing: bool) -> Result<(), StagingError> {
        Ok(())
    }

    /// Insert records in a single transaction. Either all rows land or none do.
    fn insert_records(&mut self, records: &[CanonicalRecord]) -> Result<usize, StagingError>;

    /// Insert a new run row and return its id
    fn create_run(&mut self, run: &RunRecord) -> Result<i64, StagingError>;

    /// Overwrite the mutable columns of an existing run row
    fn update_run(&mut self, run: &RunRecord) -> Result<(), StagingError>;

    /// Insert a quality summary and return its id
    fn insert_quality_metrics(&mut self, metrics: &QualityMetrics) -> Result<i64, StagingError>;
}

/// In-memory store.
///
/// Applies the same row constraint as the database table (`number_of_reviews >= 0`),
/// so a batch containing a violating record is rejected as a whole.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub records: Vec<CanonicalRecord>,
    pub runs: Vec<RunRecord>,
    pub metrics: Vec<QualityMetrics>,
}

impl MemoryStore {
    /// Look up a run by id
    pub fn run(&self, id: i64) -> Option<&RunRecord> {
        self.runs.iter().find(|r| r.id == Some(id))
    }
}

impl IngestStore for MemoryStore {
    fn insert_records(&mut self, records: &[CanonicalRecord]) -> Result<usize, StagingError> {
        if let Some(bad) = records
            .iter()
            .find(|r| r.number_of_reviews.is_some_and(|n| n < 0))
        {
            return Err(StagingError::Database(format!(
                "CHECK constraint failed: number_of_reviews = {:?}",
                bad.number_of_reviews
            )));
        }
        self.records.extend_from_slice(records);
        Ok(records.len())
    }

    fn create_run(&mut self, run: &RunRecord) -> Result<i64, StagingError> {
        let id = self.runs.len() as i64 + 1;
        let mut stored = run.clone();
        stored.id = Some(id);
        self.runs.push(stored);
        Ok(id)
    }

    fn update_run(&mut self, run: &RunRecord) -> Result<(), StagingError> {
        let slot = self
            .runs
            .iter_mut()
            .find(|r| r.id.is_some() && r.id == run.id)
            .ok_or_else(|| StagingError::Database(format!("Run {:?} not found", run.id)))?;
        *slot = run.clone();
        Ok(())
    }

    fn insert_quality_metrics(&mut self, metrics: &QualityMetrics) -> Result<i64, StagingError> {
        self.metrics.push(metrics.clone());
        Ok(self.metrics.len() as i64)
    }
}
