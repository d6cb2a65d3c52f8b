//! Import command - register documents from table files.

use std::path::PathBuf;

use clap::Args;
use console::style;
use glob::glob;
use tracing::{debug, warn};

use regform_core::{DocumentRef, FormKind, Store};

use super::{load_config, open_store};
use crate::GlobalArgs;

/// Arguments for the import command.
#[derive(Args)]
pub struct ImportArgs {
    /// Form kind declared for every matched document
    #[arg(short, long)]
    form_kind: FormKind,

    /// Glob of table files (defaults to every JSON file in the tables directory)
    pattern: Option<String>,
}

pub async fn run(args: ImportArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let config = load_config(global)?;

    let pattern = args.pattern.unwrap_or_else(|| {
        config
            .source
            .tables_dir
            .join("*.json")
            .to_string_lossy()
            .into_owned()
    });

    let files: Vec<PathBuf> = glob(&pattern)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching table files found for pattern: {}", pattern);
    }

    let store = open_store(&config)?;
    let mut added = 0;
    let mut known = 0;

    for path in &files {
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!("Skipping {}: file name is not valid UTF-8", path.display());
            continue;
        };
        if path.parent() != Some(config.source.tables_dir.as_path()) {
            debug!(
                "{} is outside the tables directory {}",
                path.display(),
                config.source.tables_dir.display()
            );
        }

        if store.register_document(&DocumentRef::new(id, args.form_kind.code()))? {
            added += 1;
        } else {
            known += 1;
        }
    }

    println!(
        "{} Registered {} new {} documents ({} already known)",
        style("✓").green(),
        added,
        args.form_kind,
        known
    );

    Ok(())
}
