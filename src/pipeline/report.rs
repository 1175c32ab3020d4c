//! Run summary returned by the executor

use serde::Serialize;

use crate::staging::{ChunkQuality, RunRecord, RunStatus};

/// Summary of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Id of the `processing_log` row
    pub run_id: i64,
    /// Processing batch identifier stamped on every record
    pub batch_id: String,
    /// Source name recorded on the rows
    pub file_name: String,
    /// Final status
    pub status: RunStatus,
    /// Raw rows read from the source
    pub total_rows: u64,
    /// Rows committed to `processed_data`
    pub processed_rows: u64,
    /// Quality counters for the whole run
    pub quality: ChunkQuality,
    /// Wall-clock seconds between begin and finish
    pub processing_time_seconds: f64,
}

impl PipelineReport {
    /// Build a report from the finished run row and the run's quality totals
    pub fn from_run(run: &RunRecord, quality: ChunkQuality) -> Self {
        Self {
            run_id: run.id.unwrap_or_default(),
            batch_id: run.batch_id.clone(),
            file_name: run.file_name.clone(),
            status: run.status,
            total_rows: run.total_rows.unwrap_or_default().max(0) as u64,
            processed_rows: run.processed_rows.max(0) as u64,
            quality,
            processing_time_seconds: run.processing_time_seconds.unwrap_or_default(),
        }
    }

    /// Check if the run completed
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Percentage of raw rows that were committed (0 when nothing was read)
    pub fn success_rate(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            self.processed_rows as f64 / self.total_rows as f64 * 100.0
        }
    }

    /// Get formatted duration
    pub fn duration_formatted(&self) -> String {
        let secs = self.processing_time_seconds.max(0.0);
        let mins = (secs / 60.0).floor() as u64;
        let remaining = secs - (mins * 60) as f64;

        if mins > 0 {
            format!("{}m {:.0}s", mins, remaining)
        } else {
            format!("{:.2}s", secs)
        }
    }

    /// Print summary to stderr
    pub fn print_summary(&self) {
        eprintln!();
        eprintln!("Run {} ({}) - {}", self.run_id, self.batch_id, self.status);
        eprintln!("Source: {}", self.file_name);
        eprintln!("Duration: {}", self.duration_formatted());
        eprintln!(
            "Rows: {} read, {} written ({:.2}%)",
            format_number(self.total_rows),
            format_number(self.processed_rows),
            self.success_rate()
        );
        eprintln!(
            "Quality: {} valid, {} invalid, {} with nulls, {} duplicates",
            format_number(self.quality.valid),
            format_number(self.quality.invalid),
            format_number(self.quality.null),
            format_number(self.quality.duplicate)
        );
        if self.quality.coercion_failures > 0 {
            eprintln!(
                "Coerced to null: {} field values",
                format_number(self.quality.coercion_failures)
            );
        }
    }
}

/// Format a number with thousand separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
