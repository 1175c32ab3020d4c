//! Chunked ingestion of product listing CSVs into DuckDB
//!
//! Each chunk read from the source goes through the same steps:
//!
//! 1. [`RowNormalizer`] turns raw rows into typed [`CanonicalRecord`]s
//! 2. [`dedup_chunk`] drops in-chunk duplicates
//! 3. [`BatchWriter`] commits the survivors in sub-batches
//! 4. [`QualityAggregator`] accumulates the chunk's counters
//! 5. [`RunTracker`] advances the run row in `processing_log`
//!
//! The orchestration lives in [`crate::pipeline`].

mod config;
mod db;
mod dedup;
mod error;
mod normalize;
mod quality;
mod reader;
mod record;
mod run;
mod schema;
mod store;
mod writer;

pub use config::{
    Compression, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, IngestConfig, IngestConfigBuilder,
};
pub use db::StagingDb;
pub use dedup::{DedupOutcome, dedup_chunk};
pub use error::{IngestError, RowError, StagingError};
pub use normalize::{NormalizedRow, RowNormalizer, parse_decimal, parse_flag, parse_integer};
pub use quality::{ChunkQuality, QualityAggregator, QualityMetrics};
pub use reader::{Chunk, ChunkReader, decode_stream, open_source};
pub use record::{CanonicalRecord, Field, FieldKind, FieldValue};
pub use run::{RunRecord, RunStatus, RunTracker};
pub use schema::{SCHEMA_VERSION, StagingSchema};
pub use store::{IngestStore, MemoryStore};
pub use writer::{BatchWriter, WriteSummary};
