//! Pipeline configuration types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use crate::staging::{Compression, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, IngestConfig};

/// Environment variable overriding the database path
pub const ENV_DATABASE: &str = "INGEST_DATABASE";
/// Environment variable overriding the chunk size
pub const ENV_CHUNK_SIZE: &str = "INGEST_CHUNK_SIZE";
/// Environment variable overriding the sub-batch size
pub const ENV_BATCH_SIZE: &str = "INGEST_BATCH_SIZE";
/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Resolved settings for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// DuckDB database path
    pub database: PathBuf,
    /// Local CSV source (plain or gzip)
    pub source: Option<PathBuf>,
    /// Name recorded on rows and in the run log (defaults to the source file name)
    pub source_file: Option<String>,
    /// Source encoding
    pub compression: Compression,
    /// Rows per chunk held in memory
    pub chunk_size: usize,
    /// Rows per atomic sub-batch commit
    pub batch_size: usize,
    /// Processing batch identifier (random UUID when unset)
    pub batch_id: Option<String>,
    /// Create missing tables before the first write
    pub init_schema: bool,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Show a progress spinner in the CLI
    pub progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("listings.duckdb"),
            source: None,
            source_file: None,
            compression: Compression::Auto,
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_id: None,
            init_schema: true,
            log_level: "info".to_string(),
            progress: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline config
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a config from TOML text
    pub fn from_toml_str(content: &str) -> PipelineResult<Self> {
        toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(self) -> PipelineResult<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(mut self, lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(database) = lookup(ENV_DATABASE) {
            self.database = PathBuf::from(database);
        }
        if let Some(value) = lookup(ENV_CHUNK_SIZE) {
            self.chunk_size = parse_size(ENV_CHUNK_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_BATCH_SIZE) {
            self.batch_size = parse_size(ENV_BATCH_SIZE, &value)?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level.to_lowercase();
        }
        Ok(self)
    }

    /// Set the database path
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = path.into();
        self
    }

    /// Set the source path
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Set the name recorded as `source_file`
    pub fn with_source_file(mut self, name: impl Into<String>) -> Self {
        self.source_file = Some(name.into());
        self
    }

    /// Set the source compression
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the sub-batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Use a fixed processing batch identifier
    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    /// Enable or disable schema bootstrap
    pub fn with_init_schema(mut self, init_schema: bool) -> Self {
        self.init_schema = init_schema;
        self
    }

    /// Set the default log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable or disable the progress spinner
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Reader and writer settings derived from this config
    pub fn ingest_config(&self) -> PipelineResult<IngestConfig> {
        IngestConfig::builder()
            .chunk_size(self.chunk_size)
            .batch_size(self.batch_size)
            .compression(self.compression)
            .build()
            .map_err(PipelineError::Config)
    }

    /// Name recorded on every row: the explicit `source_file`, else the source's file name
    pub fn source_file_name(&self) -> String {
        if let Some(name) = &self.source_file {
            return name.clone();
        }
        self.source
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stdin".to_string())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.source.is_none() && self.source_file.is_none() {
            return Err("Source path is required".to_string());
        }
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than zero".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be greater than zero".to_string());
        }
        if let Some(batch_id) = &self.batch_id {
            if batch_id.trim().is_empty() {
                return Err("batch_id must not be empty".to_string());
            }
        }
        Ok(())
    }
}

fn parse_size(key: &str, value: &str) -> PipelineResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| PipelineError::Config(format!("{key} must be a positive integer, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new();
        assert_eq!(config.chunk_size, 10_000);
        assert_eq!(config.batch_size, 1_000);
        assert!(config.init_schema);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_and_validate() {
        let config = PipelineConfig::new()
            .with_source("/data/lazada.csv.gz")
            .with_chunk_size(500)
            .with_batch_size(50);
        assert!(config.validate().is_ok());
        assert_eq!(config.source_file_name(), "lazada.csv.gz");

        let ingest = config.ingest_config().unwrap();
        assert_eq!(ingest.chunk_size, 500);
        assert_eq!(ingest.batch_size, 50);

        assert!(config.clone().with_batch_size(0).validate().is_err());
        assert!(config.clone().with_chunk_size(0).validate().is_err());
        assert!(config.with_batch_id("  ").validate().is_err());
    }

    #[test]
    fn test_explicit_source_file_name_wins() {
        let config = PipelineConfig::new()
            .with_source("/tmp/cache/abc123")
            .with_source_file("lazada.csv.gz");
        assert_eq!(config.source_file_name(), "lazada.csv.gz");
    }

    #[test]
    fn test_from_toml_str() {
        let config = PipelineConfig::from_toml_str(
            r#"
            database = "out.duckdb"
            source = "in.csv"
            compression = "none"
            batch_size = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.database, PathBuf::from("out.duckdb"));
        assert_eq!(config.compression, Compression::None);
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);

        assert!(PipelineConfig::from_toml_str("chunk_size = \"many\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DATABASE, "/var/lib/ingest.duckdb"),
            (ENV_CHUNK_SIZE, "2000"),
            (ENV_LOG_LEVEL, "DEBUG"),
        ]);
        let config = PipelineConfig::new()
            .apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database, PathBuf::from("/var/lib/ingest.duckdb"));
        assert_eq!(config.chunk_size, 2000);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.log_level, "debug");

        let bad = PipelineConfig::new()
            .apply_env_from(|k| (k == ENV_BATCH_SIZE).then(|| "lots".to_string()));
        assert!(matches!(bad, Err(PipelineError::Config(_))));
    }
}
