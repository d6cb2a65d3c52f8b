//! Feedback command - report one stored iteration.

use clap::Args;
use console::style;

use regform_core::{Comparator, Feedback, FormKind};

use super::{OutputFormat, load_config, open_store};
use crate::GlobalArgs;

/// Arguments for the feedback command.
#[derive(Args)]
pub struct FeedbackArgs {
    /// Form kind
    #[arg(short, long)]
    form_kind: FormKind,

    /// Iteration number
    #[arg(short, long)]
    iteration: u32,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

pub async fn run(args: FeedbackArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let config = load_config(global)?;
    let store = open_store(&config)?;

    let feedback = Comparator::new(&store)
        .feedback(args.form_kind, args.iteration)?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No iteration {} stored for {}",
                args.iteration,
                args.form_kind
            )
        })?;

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&feedback)?,
        OutputFormat::Csv => format_csv(&feedback)?,
        OutputFormat::Text => format_text(&feedback),
    };
    print!("{}", output);

    Ok(())
}

fn format_csv(feedback: &Feedback) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "document_id",
        "error_kind",
        "error_detail",
        "missing_critical_fields",
    ])?;

    for failure in &feedback.failures {
        wtr.write_record([
            failure.document_id.as_str(),
            failure.error_kind.map(|k| k.code()).unwrap_or(""),
            failure.error_detail.as_deref().unwrap_or(""),
            &failure.missing_critical_fields.join(";"),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(feedback: &Feedback) -> String {
    let run = &feedback.run;
    let mut output = String::new();

    output.push_str(&format!(
        "{} iteration {} ({}, {} mode)\n",
        style(run.form_kind).bold(),
        run.iteration,
        run.parser_version,
        run.mode
    ));
    if let Some(notes) = &run.notes {
        output.push_str(&format!("Notes: {}\n", notes));
    }
    output.push_str(&format!(
        "Documents: {}  Successful: {}  Failed: {}  Success rate: {}%\n",
        run.total_docs, run.success_count, run.failure_count, run.success_rate
    ));
    if run.cancelled {
        output.push_str("Run was cancelled before all documents were submitted\n");
    }

    if !run.error_distribution.is_empty() {
        output.push_str("\nErrors by kind:\n");
        for (kind, count) in &run.error_distribution {
            output.push_str(&format!("  {:<24} {}\n", kind.code(), count));
        }
    }

    if let Some(top) = &run.top_error {
        output.push_str(&format!(
            "\nTop error ({} documents):\n  {}\n  e.g. {}\n",
            top.count,
            top.pattern,
            top.examples.join(", ")
        ));
    }

    if !run.missing_fields.is_empty() {
        output.push_str("\nMissing critical fields:\n");
        for (field, count) in &run.missing_fields {
            output.push_str(&format!("  {:<24} {}\n", field, count));
        }
    }

    if !run.field_hits.is_empty() {
        output.push_str("\nField hits:\n");
        for (field, count) in &run.field_hits {
            output.push_str(&format!("  {:<24} {}/{}\n", field, count, run.total_docs));
        }
    }

    output
}
