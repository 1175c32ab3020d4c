//! Listing Ingest - chunked CSV ingestion for product listing exports
//!
//! Provides:
//! - Streaming, bounded-memory reading of plain or gzip CSV sources
//! - Row normalization into a typed canonical record
//! - In-chunk deduplication
//! - Sub-batched transactional writes into DuckDB
//! - Run lifecycle and data-quality tracking

pub mod pipeline;
pub mod staging;

// Re-export commonly used types
pub use pipeline::{
    PipelineConfig, PipelineError, PipelineExecutor, PipelineReport, PipelineResult, run_pipeline,
};
pub use staging::{
    CanonicalRecord, IngestError, IngestStore, QualityMetrics, RunRecord, RunStatus, StagingDb,
    StagingError,
};
