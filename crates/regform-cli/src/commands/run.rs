//! Run command - parse a batch of documents as one iteration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use regform_core::{
    FormKind, IterationRun, IterationTracker, JsonTableSource, RunOutcome, RunRequest,
    SelectionMode,
};

use super::{load_config, open_store};
use crate::GlobalArgs;

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Form kind to parse
    #[arg(short, long)]
    form_kind: FormKind,

    /// Iteration number, increasing per form kind
    #[arg(short, long)]
    iteration: u32,

    /// Parser version label stored with every result
    #[arg(short = 'p', long)]
    parser_version: String,

    /// Maximum documents to process (defaults to tracker.batch_size)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Document selection: fresh, reparse_failed or reparse_all
    #[arg(short, long, default_value = "fresh")]
    mode: SelectionMode,

    /// Free-text notes stored with the iteration
    #[arg(short, long)]
    notes: Option<String>,
}

pub async fn run(args: RunArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let config = load_config(global)?;

    let mut request = RunRequest::new(args.form_kind, args.iteration, args.parser_version)
        .with_mode(args.mode);
    if let Some(batch_size) = args.batch_size {
        request = request.with_batch_size(batch_size);
    }
    if let Some(notes) = args.notes {
        request = request.with_notes(notes);
    }

    // Ctrl-C stops submission; completed documents are still aggregated
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight documents");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents")?
            .progress_chars("=>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let bar = pb.clone();
    let outcome = tokio::task::spawn_blocking(move || -> anyhow::Result<RunOutcome> {
        let store = open_store(&config)?;
        let source = JsonTableSource::new(&config.source.tables_dir);
        let tracker = IterationTracker::new(&store, &source, &config)
            .with_cancel_flag(cancel)
            .with_progress(move |done, total| {
                bar.set_length(total as u64);
                bar.set_position(done as u64);
            });
        Ok(tracker.run_iteration(&request)?)
    })
    .await??;

    pb.finish_and_clear();

    match outcome {
        RunOutcome::Completed(run) => {
            print_summary(&run);
            Ok(())
        }
        RunOutcome::Aborted {
            reason,
            documents_recorded,
        } => {
            println!(
                "{} Iteration {} of {} aborted: {}",
                style("✗").red(),
                args.iteration,
                args.form_kind,
                reason
            );
            if documents_recorded > 0 {
                println!(
                    "   {} document attempts were recorded and can be resumed with --mode reparse_failed",
                    documents_recorded
                );
            }
            anyhow::bail!("run aborted: {}", reason)
        }
    }
}

fn print_summary(run: &IterationRun) {
    println!(
        "{} Iteration {} of {} completed{}",
        style("✓").green(),
        run.iteration,
        run.form_kind,
        if run.cancelled { " (cancelled early)" } else { "" }
    );
    println!(
        "   {} documents, {} successful, {} failed ({}%) in {}ms",
        run.total_docs,
        style(run.success_count).green(),
        style(run.failure_count).red(),
        run.success_rate,
        run.duration_ms
    );

    if let Some(top) = &run.top_error {
        println!();
        println!("{}", style("Top error:").red());
        println!("  {} ({} documents)", top.pattern, top.count);
        println!("  e.g. {}", top.examples.join(", "));
    }

    if !run.missing_fields.is_empty() {
        let mut missing: Vec<_> = run.missing_fields.iter().collect();
        missing.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        println!();
        println!("{}", style("Missing critical fields:").yellow());
        for (field, count) in missing {
            println!("  - {}: {}", field, count);
        }
    }
}
