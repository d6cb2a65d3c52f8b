//! Configuration structures for the parsing pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for regform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegformConfig {
    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Iteration tracker configuration.
    pub tracker: TrackerConfig,

    /// Persistence configuration.
    pub store: StoreConfig,

    /// Table source configuration.
    pub source: SourceConfig,
}

/// Field extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// A candidate value needs more than this many alphanumeric characters
    /// when its field has no explicit validator.
    pub min_visible_chars: usize,

    /// Report critical RUT fields with a bad check digit as missing.
    pub checksum_strict: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_visible_chars: 1,
            checksum_strict: false,
        }
    }
}

/// Batch run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Default maximum number of documents per run.
    pub batch_size: usize,

    /// Worker threads (0 = available parallelism).
    pub workers: usize,

    /// Documents submitted per wave; history is written after each wave.
    pub chunk_size: usize,

    /// Example document ids kept for the dominant error pattern.
    pub sample_limit: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            workers: 0,
            chunk_size: 64,
            sample_limit: 20,
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub database: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("regform.sqlite"),
        }
    }
}

/// Table source configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding `<document_id>.json` table files.
    pub tables_dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            tables_dir: PathBuf::from("tables"),
        }
    }
}

impl RegformConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
