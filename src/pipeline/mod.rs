//! Pipeline orchestration for listing ingestion
//!
//! A run streams one CSV source in bounded chunks. Every chunk is normalized,
//! deduplicated, written in sub-batch transactions and folded into the run's
//! quality counters. The `processing_log` row follows the run from `pending`
//! to `completed` or `failed`.
//!
//! # Example
//!
//! ```rust,ignore
//! use listing_ingest::pipeline::{PipelineConfig, PipelineExecutor};
//! use listing_ingest::staging::StagingDb;
//!
//! let config = PipelineConfig::new()
//!     .with_source("/data/lazada_products.csv.gz")
//!     .with_database("listings.duckdb");
//!
//! let mut db = StagingDb::open("listings.duckdb")?;
//! let mut executor = PipelineExecutor::new(config)?;
//! let report = executor.run(&mut db)?;
//!
//! println!("{} rows in {}", report.processed_rows, report.duration_formatted());
//! ```
//!
//! # Failure
//!
//! A stream or write failure aborts the run. Sub-batches committed before the
//! failure stay in place, the run row is marked `failed` with the cause, and the
//! original error is returned.

mod config;
mod error;
mod executor;
#[cfg(feature = "cli")]
mod progress;
mod report;

pub use config::{ENV_BATCH_SIZE, ENV_CHUNK_SIZE, ENV_DATABASE, ENV_LOG_LEVEL, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use executor::{ChunkProgress, PipelineExecutor, RunObserver, clean_chunk};
#[cfg(feature = "cli")]
pub use progress::IngestProgress;
pub use report::{PipelineReport, format_number};

use crate::staging::StagingDb;

/// Run a pipeline against the database named in the configuration
///
/// This is a convenience function for simple pipeline execution.
pub fn run_pipeline(config: PipelineConfig) -> PipelineResult<PipelineReport> {
    let mut db = StagingDb::open(&config.database.to_string_lossy())?;
    let mut executor = PipelineExecutor::new(config)?;
    executor.run(&mut db)
}
