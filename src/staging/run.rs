//! Run lifecycle tracking in `processing_log`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::IngestError;
use super::store::IngestStore;

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Row created, work not started
    Pending,
    /// Chunks are being processed
    Running,
    /// Every chunk was written
    Completed,
    /// The run aborted
    Failed,
}

impl RunStatus {
    /// Whether no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(format!("Invalid run status: {}", s)),
        }
    }
}

/// One row of `processing_log`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Surrogate id, assigned on insert
    pub id: Option<i64>,
    /// Name of the source file
    pub file_name: String,
    /// Processing batch identifier shared with the written records
    pub batch_id: String,
    /// Raw rows read, known once reading stops
    pub total_rows: Option<i64>,
    /// Rows committed so far
    pub processed_rows: i64,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub processing_time_seconds: Option<f64>,
}

impl RunRecord {
    /// Create a pending run starting now
    pub fn new(file_name: impl Into<String>, batch_id: impl Into<String>) -> Self {
        Self {
            id: None,
            file_name: file_name.into(),
            batch_id: batch_id.into(),
            total_rows: None,
            processed_rows: 0,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            processing_time_seconds: None,
        }
    }
}

/// Drives one run row through `pending -> running -> completed | failed`.
///
/// `processed_rows` only ever grows, and nothing is accepted after a terminal status.
/// The tracked state changes only once the store accepted the write, so a failed
/// update leaves the run open for a later `finish`.
#[derive(Debug, Default)]
pub struct RunTracker {
    record: Option<RunRecord>,
}

impl RunTracker {
    /// Create a tracker with no run yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of the run, if begun
    pub fn record(&self) -> Option<&RunRecord> {
        self.record.as_ref()
    }

    /// Create the run row and move it to running. Returns the run id.
    pub fn begin<S: IngestStore + ?Sized>(
        &mut self,
        store: &mut S,
        file_name: &str,
        batch_id: &str,
    ) -> Result<i64, IngestError> {
        if self.record.is_some() {
            return Err(IngestError::Usage("run already begun".to_string()));
        }

        let mut record = RunRecord::new(file_name, batch_id);
        let id = store.create_run(&record)?;
        record.id = Some(id);

        let mut running = record.clone();
        running.status = RunStatus::Running;
        if let Err(e) = store.update_run(&running) {
            // Do not leave the pending row behind
            record.status = RunStatus::Failed;
            record.completed_at = Some(Utc::now());
            record.error_message = Some(format!("Run could not start: {e}"));
            match store.update_run(&record) {
                Ok(()) => self.record = Some(record),
                Err(e) => warn!(run_id = id, error = %e, "Could not mark pending run as failed"),
            }
            return Err(e.into());
        }

        info!(run_id = id, file_name, batch_id, "Run started");
        self.record = Some(running);
        Ok(id)
    }

    /// Add committed rows and persist the new count
    pub fn advance<S: IngestStore + ?Sized>(
        &mut self,
        store: &mut S,
        rows: u64,
    ) -> Result<i64, IngestError> {
        let record = self.running_mut("advance")?;
        let mut next = record.clone();
        next.processed_rows += rows as i64;
        store.update_run(&next)?;
        *record = next;
        let processed = record.processed_rows;

        debug!(processed_rows = processed, "Run progress");
        Ok(processed)
    }

    /// Record how many raw rows the source produced. Persisted on `finish`.
    pub fn set_total_rows(&mut self, total: u64) -> Result<(), IngestError> {
        self.running_mut("set_total_rows")?.total_rows = Some(total as i64);
        Ok(())
    }

    /// Move the run to a terminal status and stamp timing
    pub fn finish<S: IngestStore + ?Sized>(
        &mut self,
        store: &mut S,
        status: RunStatus,
        error_message: Option<String>,
    ) -> Result<&RunRecord, IngestError> {
        if !status.is_terminal() {
            return Err(IngestError::Usage(format!(
                "finish requires a terminal status, got {status}"
            )));
        }

        let record = self.running_mut("finish")?;
        let now = Utc::now();
        let mut finished = record.clone();
        finished.status = status;
        finished.completed_at = Some(now);
        finished.error_message = error_message;
        finished.processing_time_seconds =
            Some((now - finished.started_at).num_milliseconds().max(0) as f64 / 1000.0);
        store.update_run(&finished)?;
        *record = finished;

        info!(
            run_id = ?record.id,
            status = %record.status,
            processed_rows = record.processed_rows,
            seconds = ?record.processing_time_seconds,
            "Run finished"
        );
        Ok(record)
    }

    fn running_mut(&mut self, op: &str) -> Result<&mut RunRecord, IngestError> {
        match self.record.as_mut() {
            None => Err(IngestError::Usage(format!("{op} called before begin"))),
            Some(r) if r.status.is_terminal() => Err(IngestError::Usage(format!(
                "{op} called after run {}",
                r.status
            ))),
            Some(r) => Ok(r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::store::MemoryStore;

    #[test]
    fn test_run_status_parse() {
        assert_eq!("Running".parse::<RunStatus>().unwrap(), RunStatus::Running);
        assert_eq!("failed".parse::<RunStatus>().unwrap(), RunStatus::Failed);
        assert!("done".parse::<RunStatus>().is_err());
        assert!(RunStatus::Completed.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
    }

    #[test]
    fn test_lifecycle() {
        let mut store = MemoryStore::default();
        let mut tracker = RunTracker::new();

        let id = tracker.begin(&mut store, "in.csv.gz", "b-1").unwrap();
        assert_eq!(store.run(id).unwrap().status, RunStatus::Running);

        assert_eq!(tracker.advance(&mut store, 1000).unwrap(), 1000);
        assert_eq!(tracker.advance(&mut store, 500).unwrap(), 1500);
        assert_eq!(store.run(id).unwrap().processed_rows, 1500);

        tracker.set_total_rows(1600).unwrap();
        let record = tracker
            .finish(&mut store, RunStatus::Completed, None)
            .unwrap();
        assert!(record.completed_at.is_some());
        assert!(record.processing_time_seconds.unwrap() >= 0.0);

        let stored = store.run(id).unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
        assert_eq!(stored.total_rows, Some(1600));
    }

    #[test]
    fn test_advance_before_begin_is_usage_error() {
        let mut store = MemoryStore::default();
        let mut tracker = RunTracker::new();
        let err = tracker.advance(&mut store, 1).unwrap_err();
        assert!(err.is_usage());
        assert!(store.runs.is_empty());
    }

    #[test]
    fn test_nothing_accepted_after_terminal_status() {
        let mut store = MemoryStore::default();
        let mut tracker = RunTracker::new();
        let id = tracker.begin(&mut store, "in.csv", "b-2").unwrap();
        tracker
            .finish(&mut store, RunStatus::Failed, Some("boom".to_string()))
            .unwrap();

        assert!(tracker.advance(&mut store, 1).unwrap_err().is_usage());
        assert!(
            tracker
                .finish(&mut store, RunStatus::Completed, None)
                .unwrap_err()
                .is_usage()
        );
        let stored = store.run(id).unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("boom"));
    }

    /// Refuses updates that move a run to the given status
    struct RefusingStore {
        inner: MemoryStore,
        refuse: RunStatus,
    }

    impl IngestStore for RefusingStore {
        fn insert_records(
            &mut self,
            records: &[crate::staging::CanonicalRecord],
        ) -> Result<usize, crate::staging::StagingError> {
            self.inner.insert_records(records)
        }
        fn create_run(&mut self, run: &RunRecord) -> Result<i64, crate::staging::StagingError> {
            self.inner.create_run(run)
        }
        fn update_run(&mut self, run: &RunRecord) -> Result<(), crate::staging::StagingError> {
            if run.status == self.refuse {
                return Err(crate::staging::StagingError::Database(
                    "connection lost".to_string(),
                ));
            }
            self.inner.update_run(run)
        }
        fn insert_quality_metrics(
            &mut self,
            metrics: &crate::staging::QualityMetrics,
        ) -> Result<i64, crate::staging::StagingError> {
            self.inner.insert_quality_metrics(metrics)
        }
    }

    #[test]
    fn test_failed_finish_keeps_the_run_open() {
        let mut store = RefusingStore {
            inner: MemoryStore::default(),
            refuse: RunStatus::Completed,
        };
        let mut tracker = RunTracker::new();
        let id = tracker.begin(&mut store, "in.csv", "b-4").unwrap();

        assert!(
            tracker
                .finish(&mut store, RunStatus::Completed, None)
                .is_err()
        );
        assert_eq!(tracker.record().unwrap().status, RunStatus::Running);
        assert!(tracker.record().unwrap().completed_at.is_none());

        let record = tracker
            .finish(&mut store, RunStatus::Failed, Some("connection lost".to_string()))
            .unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(store.inner.run(id).unwrap().status, RunStatus::Failed);
    }

    #[test]
    fn test_failed_start_does_not_leave_a_pending_row() {
        let mut store = RefusingStore {
            inner: MemoryStore::default(),
            refuse: RunStatus::Running,
        };
        let mut tracker = RunTracker::new();

        assert!(tracker.begin(&mut store, "in.csv", "b-5").is_err());

        let stored = &store.inner.runs[0];
        assert_eq!(stored.status, RunStatus::Failed);
        assert!(stored.completed_at.is_some());
        assert!(
            stored
                .error_message
                .as_deref()
                .unwrap()
                .contains("connection lost")
        );
        assert_eq!(tracker.record().unwrap().status, RunStatus::Failed);
        assert!(tracker.advance(&mut store, 1).unwrap_err().is_usage());
    }

    #[test]
    fn test_finish_requires_terminal_status() {
        let mut store = MemoryStore::default();
        let mut tracker = RunTracker::new();
        tracker.begin(&mut store, "in.csv", "b-3").unwrap();
        assert!(
            tracker
                .finish(&mut store, RunStatus::Running, None)
                .unwrap_err()
                .is_usage()
        );
        assert!(tracker.begin(&mut store, "in.csv", "b-3").unwrap_err().is_usage());
    }
}
