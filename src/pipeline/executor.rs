//! Pipeline executor driving one ingestion run

use std::io::{BufReader, Read};

use tracing::{debug, error, field, info, info_span, warn};
use uuid::Uuid;

use super::config::PipelineConfig;
use super::error::{PipelineError, PipelineResult};
use super::report::PipelineReport;
use crate::staging::{
    BatchWriter, CanonicalRecord, ChunkQuality, ChunkReader, IngestConfig, IngestError,
    IngestStore, QualityAggregator, RowNormalizer, RunRecord, RunStatus, RunTracker,
    decode_stream, dedup_chunk, open_source,
};

/// Progress of a run after one chunk was committed
#[derive(Debug, Clone, Copy)]
pub struct ChunkProgress {
    /// Zero-based chunk number
    pub index: usize,
    /// Raw rows read so far
    pub rows_read: u64,
    /// Rows committed so far in this run
    pub rows_written: u64,
    /// Counters of the chunk just committed
    pub quality: ChunkQuality,
}

/// Hooks called while a run progresses. All methods default to no-ops.
pub trait RunObserver {
    /// A chunk was fully written
    fn chunk_committed(&mut self, _progress: &ChunkProgress) {}

    /// The run completed
    fn finished(&mut self, _report: &PipelineReport) {}

    /// The run failed; the run row has already been finalized
    fn failed(&mut self, _error: &IngestError) {}
}

/// Drives a source through normalize, dedup, write and quality accounting
pub struct PipelineExecutor {
    config: PipelineConfig,
    ingest: IngestConfig,
    batch_id: String,
    observer: Option<Box<dyn RunObserver>>,
    last_run: Option<RunRecord>,
}

impl PipelineExecutor {
    /// Create a new pipeline executor
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::Config)?;
        let ingest = config.ingest_config()?;
        let batch_id = config
            .batch_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Self {
            config,
            ingest,
            batch_id,
            observer: None,
            last_run: None,
        })
    }

    /// Attach an observer notified after every chunk
    pub fn with_observer(mut self, observer: Box<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Processing batch identifier stamped on every record of this run
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// The run row as last written, success or failure
    pub fn last_run(&self) -> Option<&RunRecord> {
        self.last_run.as_ref()
    }

    /// Run the configured source file into the store
    pub fn run<S: IngestStore + ?Sized>(&mut self, store: &mut S) -> PipelineResult<PipelineReport> {
        let source = self
            .config
            .source
            .clone()
            .ok_or_else(|| PipelineError::Config("Source path is required".to_string()))?;
        let compression = self.ingest.compression;

        self.execute(store, move || open_source(&source, compression))
    }

    /// Run an already opened byte stream into the store.
    ///
    /// Gzip content is detected from its magic bytes unless compression is set explicitly.
    pub fn run_stream<S, R>(&mut self, store: &mut S, reader: R) -> PipelineResult<PipelineReport>
    where
        S: IngestStore + ?Sized,
        R: Read + 'static,
    {
        let compression = self.ingest.compression;
        self.execute(store, move || decode_stream(BufReader::new(reader), compression))
    }

    fn execute<S, F>(&mut self, store: &mut S, open: F) -> PipelineResult<PipelineReport>
    where
        S: IngestStore + ?Sized,
        F: FnOnce() -> Result<Box<dyn Read>, IngestError>,
    {
        let file_name = self.config.source_file_name();
        let span = info_span!(
            "pipeline_run",
            batch_id = %self.batch_id,
            file_name = %file_name,
            run_id = field::Empty
        );
        let _guard = span.enter();

        store.prepare_schema(self.config.init_schema)?;

        let mut tracker = RunTracker::new();
        let run_id = tracker.begin(store, &file_name, &self.batch_id)?;
        span.record("run_id", run_id);

        info!(
            chunk_size = self.ingest.chunk_size,
            batch_size = self.ingest.batch_size,
            compression = %self.ingest.compression,
            "Starting pipeline"
        );

        let mut quality = QualityAggregator::new(&self.batch_id);
        let mut rows_read = 0u64;

        let result = self
            .process(store, &mut tracker, &mut quality, &file_name, open, &mut rows_read)
            .and_then(|()| quality.persist(store).map_err(IngestError::from))
            .and_then(|_| {
                tracker.set_total_rows(rows_read)?;
                tracker
                    .finish(store, RunStatus::Completed, None)
                    .map(RunRecord::clone)
            });

        match result {
            Ok(record) => {
                let report = PipelineReport::from_run(&record, *quality.totals());
                self.last_run = Some(record);

                info!(
                    total_rows = report.total_rows,
                    processed_rows = report.processed_rows,
                    valid = report.quality.valid,
                    invalid = report.quality.invalid,
                    null = report.quality.null,
                    duplicate = report.quality.duplicate,
                    coercion_failures = report.quality.coercion_failures,
                    "Pipeline completed"
                );
                if let Some(observer) = self.observer.as_mut() {
                    observer.finished(&report);
                }
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, rows_read, "Pipeline failed");
                self.record_failure(store, &mut tracker, &mut quality, rows_read, &e);
                if let Some(observer) = self.observer.as_mut() {
                    observer.failed(&e);
                }
                Err(e.into())
            }
        }
    }

    fn process<S, F>(
        &mut self,
        store: &mut S,
        tracker: &mut RunTracker,
        quality: &mut QualityAggregator,
        file_name: &str,
        open: F,
        rows_read: &mut u64,
    ) -> Result<(), IngestError>
    where
        S: IngestStore + ?Sized,
        F: FnOnce() -> Result<Box<dyn Read>, IngestError>,
    {
        let mut reader = ChunkReader::new(open()?, self.ingest.chunk_size)?;
        let normalizer = RowNormalizer::new(reader.headers(), file_name, &self.batch_id);
        let writer = BatchWriter::new(self.ingest.batch_size);

        while let Some(next) = reader.next() {
            *rows_read = reader.rows_read();
            let chunk = next?;

            let (records, chunk_quality) = clean_chunk(&normalizer, &chunk.rows);
            let summary = writer.write_chunk(store, &self.batch_id, &records)?;
            quality.merge(&chunk_quality);
            let rows_written = tracker.advance(store, summary.rows_written as u64)?.max(0) as u64;

            debug!(
                chunk = chunk.index,
                rows = chunk.len(),
                written = summary.rows_written,
                sub_batches = summary.sub_batches,
                invalid = chunk_quality.invalid,
                duplicate = chunk_quality.duplicate,
                "Chunk committed"
            );

            if let Some(observer) = self.observer.as_mut() {
                observer.chunk_committed(&ChunkProgress {
                    index: chunk.index,
                    rows_read: *rows_read,
                    rows_written,
                    quality: chunk_quality,
                });
            }
        }

        *rows_read = reader.rows_read();
        Ok(())
    }

    /// Finalize the run row as failed. Every step is best-effort.
    fn record_failure<S: IngestStore + ?Sized>(
        &mut self,
        store: &mut S,
        tracker: &mut RunTracker,
        quality: &mut QualityAggregator,
        rows_read: u64,
        cause: &IngestError,
    ) {
        if let IngestError::ChunkWrite { committed, .. } = cause {
            if *committed > 0 {
                if let Err(e) = tracker.advance(store, *committed as u64) {
                    warn!(error = %e, "Could not record rows committed before the failure");
                }
            }
        }

        if let Err(e) = tracker.set_total_rows(rows_read) {
            warn!(error = %e, "Could not record total rows");
        }

        if !quality.is_persisted() {
            if let Err(e) = quality.persist(store) {
                warn!(error = %e, "Could not persist quality metrics for failed run");
            }
        }

        match tracker.finish(store, RunStatus::Failed, Some(error_chain(cause))) {
            Ok(record) => self.last_run = Some(record.clone()),
            Err(e) => {
                warn!(error = %e, "Could not mark run as failed");
                self.last_run = tracker.record().cloned();
            }
        }
    }
}

/// Normalize and deduplicate one chunk of raw rows
pub fn clean_chunk(
    normalizer: &RowNormalizer,
    rows: &[csv::ByteRecord],
) -> (Vec<CanonicalRecord>, ChunkQuality) {
    let mut quality = ChunkQuality {
        total: rows.len() as u64,
        ..Default::default()
    };

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        match normalizer.normalize(row, line) {
            Ok(normalized) => {
                quality.coercion_failures += u64::from(normalized.coercion_failures);
                records.push(normalized.record);
            }
            Err(e) => {
                quality.invalid += 1;
                debug!(error = %e, "Row rejected");
            }
        }
    }

    let outcome = dedup_chunk(records);
    quality.duplicate = outcome.duplicates as u64;
    quality.valid = outcome.records.len() as u64;
    quality.null = outcome
        .records
        .iter()
        .filter(|r| normalizer.has_tracked_null(r))
        .count() as u64;

    (outcome.records, quality)
}

/// Render an error with its causes, outermost first
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
