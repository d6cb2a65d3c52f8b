//! Compare command - success rates across iterations and per-document regressions.

use clap::Args;
use console::style;

use regform_core::{Comparator, Comparison, DocumentChange, FormKind};

use super::{OutputFormat, load_config, open_store};
use crate::GlobalArgs;

/// Arguments for the compare command.
#[derive(Args)]
pub struct CompareArgs {
    /// Form kind
    #[arg(short, long)]
    form_kind: FormKind,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

pub async fn run(args: CompareArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let config = load_config(global)?;
    let store = open_store(&config)?;

    let comparison = Comparator::new(&store).compare(args.form_kind)?;

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&comparison)?,
        OutputFormat::Csv => format_csv(&comparison)?,
        OutputFormat::Text => format_text(&comparison),
    };
    print!("{}", output);

    Ok(())
}

fn format_csv(comparison: &Comparison) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "iteration",
        "parser_version",
        "total_docs",
        "success_rate",
        "delta",
        "regressions",
    ])?;

    for point in &comparison.points {
        let regressions = comparison
            .regressions
            .iter()
            .filter(|r| r.to_iteration == point.iteration)
            .count();
        wtr.write_record([
            &point.iteration.to_string(),
            &point.parser_version,
            &point.total_docs.to_string(),
            &point.success_rate.to_string(),
            &point.delta.map(|d| d.to_string()).unwrap_or_default(),
            &regressions.to_string(),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(comparison: &Comparison) -> String {
    let mut output = String::new();

    if comparison.points.is_empty() {
        output.push_str(&format!(
            "No iterations stored for {}\n",
            comparison.form_kind
        ));
        return output;
    }

    output.push_str(&format!("{}\n", style(comparison.form_kind).bold()));
    output.push_str(&format!(
        "{:>9}  {:<16} {:>6} {:>8} {:>8}\n",
        "iteration", "parser", "docs", "rate", "delta"
    ));
    for point in &comparison.points {
        let delta = match point.delta {
            Some(d) if d.is_sign_negative() && !d.is_zero() => style(d.to_string()).red().to_string(),
            Some(d) => style(format!("+{}", d)).green().to_string(),
            None => "-".to_string(),
        };
        output.push_str(&format!(
            "{:>9}  {:<16} {:>6} {:>7}% {:>8}\n",
            point.iteration, point.parser_version, point.total_docs, point.success_rate, delta
        ));
    }

    push_changes(&mut output, "Regressions", &comparison.regressions);
    push_changes(&mut output, "Improvements", &comparison.improvements);

    output
}

fn push_changes(output: &mut String, title: &str, changes: &[DocumentChange]) {
    if changes.is_empty() {
        return;
    }
    output.push_str(&format!("\n{} ({}):\n", title, changes.len()));
    for change in changes {
        output.push_str(&format!(
            "  - {} [{} -> {}] {}\n",
            change.document_id,
            change.from_iteration,
            change.to_iteration,
            change.error_kind.map(|k| k.code()).unwrap_or("")
        ));
    }
}
