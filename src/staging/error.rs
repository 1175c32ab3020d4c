//! Error types for staging and ingestion

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the staging database
#[derive(Error, Debug)]
pub enum StagingError {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Database not initialized
    #[error("Database not initialized. Run 'init' first.")]
    NotInitialized,

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: i32, found: i32 },
}

/// A recoverable, per-record problem. Never aborts a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// Neither `product_id` nor `product_name` survived normalization
    #[error("Record at line {line} has neither product_id nor product_name")]
    MissingIdentifiers { line: u64 },
}

/// Errors that abort an ingestion run
#[derive(Error, Debug)]
pub enum IngestError {
    /// Source file not found
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),

    /// The byte stream failed mid-read (I/O, decompression or CSV framing)
    #[error("Stream error after {rows_read} rows: {reason}")]
    Stream { rows_read: u64, reason: String },

    /// A sub-batch commit failed; the rest of the chunk was not written
    #[error(
        "Write failed for batch {batch_id}: sub-batch of {attempted} rows rolled back, {committed} rows of the chunk already committed"
    )]
    ChunkWrite {
        batch_id: String,
        attempted: usize,
        committed: usize,
        #[source]
        source: StagingError,
    },

    /// Run tracker used outside of its lifecycle (programming fault)
    #[error("Run tracker misuse: {0}")]
    Usage(String),

    /// Staging error wrapper
    #[error(transparent)]
    Staging(#[from] StagingError),
}

impl StagingError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            StagingError::NotInitialized => {
                "Database not initialized.\n\nHint: Run 'listing-ingest init' first.".to_string()
            }
            StagingError::SchemaVersionMismatch { expected, found } => {
                format!(
                    "Schema version mismatch (expected v{expected}, found v{found}).\n\n\
                    Hint: Point --database at a fresh file or drop the existing tables."
                )
            }
            _ => self.to_string(),
        }
    }
}

impl IngestError {
    /// Create a stream error from any displayable cause
    pub fn stream(rows_read: u64, reason: impl std::fmt::Display) -> Self {
        IngestError::Stream {
            rows_read,
            reason: reason.to_string(),
        }
    }

    /// Whether the error is a programming fault rather than a data or I/O fault
    pub fn is_usage(&self) -> bool {
        matches!(self, IngestError::Usage(_))
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            IngestError::SourceNotFound(path) => {
                format!(
                    "Source not found: {}\n\nHint: Check that the file exists and the path is correct.",
                    path.display()
                )
            }
            IngestError::Stream { rows_read, reason } => {
                format!(
                    "Reading the source failed after {rows_read} rows:\n{reason}\n\n\
                    Hint: The file may be truncated or not gzip-compressed. Try --compression none."
                )
            }
            IngestError::ChunkWrite {
                attempted,
                committed,
                source,
                ..
            } => {
                format!(
                    "Writing to the database failed. A sub-batch of {attempted} rows was rolled back \
                    after {committed} rows of the chunk were committed:\n{source}"
                )
            }
            IngestError::Staging(e) => e.user_message(),
            _ => self.to_string(),
        }
    }
}

impl From<duckdb::Error> for StagingError {
    fn from(err: duckdb::Error) -> Self {
        StagingError::Database(err.to_string())
    }
}

impl From<duckdb::Error> for IngestError {
    fn from(err: duckdb::Error) -> Self {
        IngestError::Staging(StagingError::from(err))
    }
}
