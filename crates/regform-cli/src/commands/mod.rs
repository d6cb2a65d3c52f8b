//! CLI subcommands.

pub mod compare;
pub mod config;
pub mod feedback;
pub mod import;
pub mod run;

use std::path::Path;

use regform_core::{RegformConfig, SqliteStore};
use tracing::debug;

use crate::GlobalArgs;

/// Output format for reports.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    #[default]
    Text,
}

/// Resolve the configuration: `--config`, then the user config file, then
/// defaults. Command-line overrides are applied last.
pub fn load_config(global: &GlobalArgs) -> anyhow::Result<RegformConfig> {
    let mut config = match &global.config {
        Some(path) => RegformConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path, e))?,
        None => {
            let path = config::default_config_path();
            if path.exists() {
                debug!("Using config file {}", path.display());
                RegformConfig::from_file(&path)?
            } else {
                RegformConfig::default()
            }
        }
    };

    if let Some(database) = &global.database {
        config.store.database = database.clone();
    }
    if let Some(tables_dir) = &global.tables_dir {
        config.source.tables_dir = tables_dir.clone();
    }

    Ok(config)
}

pub fn open_store(config: &RegformConfig) -> anyhow::Result<SqliteStore> {
    SqliteStore::open(&config.store.database).map_err(|e| {
        anyhow::anyhow!(
            "Failed to open database {}: {}",
            config.store.database.display(),
            e
        )
    })
}
