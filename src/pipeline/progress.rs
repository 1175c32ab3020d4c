//! Progress reporting for ingestion runs
//!
//! A spinner built on `indicatif`, fed by the executor through [`RunObserver`].

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::executor::{ChunkProgress, RunObserver};
use super::report::{PipelineReport, format_number};
use crate::staging::IngestError;

/// Spinner showing chunks, rows read and rows committed
pub struct IngestProgress {
    bar: ProgressBar,
}

impl IngestProgress {
    /// Create a spinner for one run
    pub fn new(file_name: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_message(format!("Reading {file_name}"));
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A spinner that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl RunObserver for IngestProgress {
    fn chunk_committed(&mut self, progress: &ChunkProgress) {
        self.bar.set_message(format!(
            "Chunks: {} | Rows read: {} | Committed: {}",
            progress.index + 1,
            format_number(progress.rows_read),
            format_number(progress.rows_written)
        ));
        if progress.quality.rejected() > 0 {
            self.bar.println(format!(
                "  ⚠ Chunk {}: {} invalid, {} duplicates",
                progress.index + 1,
                progress.quality.invalid,
                progress.quality.duplicate
            ));
        }
    }

    fn finished(&mut self, report: &PipelineReport) {
        self.bar.finish_with_message(format!(
            "✓ {} rows committed from {}",
            format_number(report.processed_rows),
            report.file_name
        ));
    }

    fn failed(&mut self, error: &IngestError) {
        self.bar.abandon_with_message(format!("✗ {}", error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineConfig, PipelineExecutor};
    use crate::staging::MemoryStore;
    use std::io::Cursor;

    #[test]
    fn test_hidden_spinner_follows_a_run() {
        let config = PipelineConfig::new()
            .with_source_file("listings.csv")
            .with_batch_id("spinner")
            .with_chunk_size(1);
        let mut executor = PipelineExecutor::new(config)
            .unwrap()
            .with_observer(Box::new(IngestProgress::hidden()));

        let mut store = MemoryStore::default();
        let report = executor
            .run_stream(&mut store, Cursor::new("product_id,sku_id\n1,1\n1,1\n2,2\n"))
            .unwrap();

        // One row per chunk, so the repeated row is not caught
        assert_eq!(report.processed_rows, 3);
        assert_eq!(report.quality.duplicate, 0);
    }
}
