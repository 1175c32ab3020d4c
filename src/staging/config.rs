//! Configuration types for chunked ingestion

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of rows per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Default number of rows per sub-batch commit
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// How the source byte stream is encoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Detect from the file extension or the gzip magic bytes
    #[default]
    Auto,
    /// Always gunzip
    Gzip,
    /// Plain CSV
    None,
}

impl Compression {
    /// Resolve `Auto` against a source path. Magic-byte sniffing happens in the reader.
    pub fn for_path(self, path: &Path) -> Self {
        match self {
            Compression::Auto => {
                let is_gz = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("gz"))
                    .unwrap_or(false);
                if is_gz {
                    Compression::Gzip
                } else {
                    Compression::Auto
                }
            }
            other => other,
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Auto => write!(f, "auto"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Compression::Auto),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "none" | "plain" => Ok(Compression::None),
            _ => Err(format!(
                "Invalid compression: {}. Expected: auto, gzip, none",
                s
            )),
        }
    }
}

/// Settings for reading and writing one source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Rows per chunk held in memory
    pub chunk_size: usize,
    /// Rows per atomic sub-batch commit
    pub batch_size: usize,
    /// Source encoding
    pub compression: Compression,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            compression: Compression::Auto,
        }
    }
}

impl IngestConfig {
    /// Create a new builder for IngestConfig
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }
}

/// Builder for IngestConfig
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    chunk_size: Option<usize>,
    batch_size: Option<usize>,
    compression: Option<Compression>,
}

impl IngestConfigBuilder {
    /// Set the number of rows per chunk
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Set the number of rows per sub-batch commit
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Set the source compression
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Build the IngestConfig
    pub fn build(self) -> Result<IngestConfig, String> {
        let chunk_size = self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        let batch_size = self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);

        if chunk_size == 0 {
            return Err("chunk_size must be greater than zero".to_string());
        }
        if batch_size == 0 {
            return Err("batch_size must be greater than zero".to_string());
        }

        Ok(IngestConfig {
            chunk_size,
            batch_size,
            compression: self.compression.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_from_str() {
        assert_eq!("auto".parse::<Compression>().unwrap(), Compression::Auto);
        assert_eq!("GZIP".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("gz".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert!("zstd".parse::<Compression>().is_err());
    }

    #[test]
    fn test_compression_for_path() {
        let auto = Compression::Auto;
        assert_eq!(
            auto.for_path(Path::new("data/listings.csv.gz")),
            Compression::Gzip
        );
        assert_eq!(auto.for_path(Path::new("data/listings.csv")), Compression::Auto);
        assert_eq!(
            Compression::None.for_path(Path::new("data/listings.csv.gz")),
            Compression::None
        );
    }

    #[test]
    fn test_ingest_config_builder() {
        let config = IngestConfig::builder()
            .chunk_size(500)
            .batch_size(100)
            .compression(Compression::Gzip)
            .build()
            .unwrap();

        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.compression, Compression::Gzip);
    }

    #[test]
    fn test_ingest_config_builder_rejects_zero_sizes() {
        assert!(IngestConfig::builder().chunk_size(0).build().is_err());
        assert!(IngestConfig::builder().batch_size(0).build().is_err());

        let config = IngestConfig::builder().build().unwrap();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }
}
