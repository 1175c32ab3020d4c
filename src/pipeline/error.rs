//! Error types for pipeline operations
//!
//! Errors chain to their staging cause for debugging while `user_message()`
//! gives CLI-friendly text.

use thiserror::Error;

use crate::staging::{IngestError, StagingError};

/// Errors that can occur during a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run aborted while reading or writing
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Store error outside a run
    #[error(transparent)]
    Staging(#[from] StagingError),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// The ingestion error behind this failure, if any
    pub fn ingest_error(&self) -> Option<&IngestError> {
        match self {
            PipelineError::Ingest(e) => Some(e),
            _ => None,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Config(msg) => {
                format!("Configuration error: {msg}\n\nHint: Check your pipeline configuration file.")
            }
            PipelineError::Ingest(e) => e.user_message(),
            PipelineError::Staging(e) => e.user_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_display() {
        let err = PipelineError::Config("batch_size must be greater than zero".to_string());
        assert!(err.to_string().contains("batch_size"));

        let err = PipelineError::from(IngestError::stream(42, "unexpected end of file"));
        assert!(err.to_string().contains("42"));
        assert!(err.ingest_error().is_some());
    }

    #[test]
    fn test_user_message() {
        let err = PipelineError::Config("missing source".to_string());
        assert!(err.user_message().contains("Hint:"));

        let err = PipelineError::from(IngestError::SourceNotFound(PathBuf::from("/data/x.csv")));
        let msg = err.user_message();
        assert!(msg.contains("/data/x.csv"));
        assert!(msg.contains("Hint:"));

        let err = PipelineError::from(StagingError::NotInitialized);
        assert!(err.user_message().contains("init"));
        assert!(err.ingest_error().is_none());
    }
}
