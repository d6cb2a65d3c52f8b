//! CLI application for Chilean regulatory filing parsing.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{compare, config, feedback, import, run};

/// Regulatory filings - iterate parsers over extracted filing tables
#[derive(Parser)]
#[command(name = "regform")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// SQLite database (overrides store.database)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Directory of table files (overrides source.tables_dir)
    #[arg(long, global = true)]
    pub tables_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register documents from table files
    Import(import::ImportArgs),

    /// Run one parsing iteration over a form kind
    Run(run::RunArgs),

    /// Show the statistics and failures of one iteration
    Feedback(feedback::FeedbackArgs),

    /// Compare all iterations of a form kind
    Compare(compare::CompareArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity, RUST_LOG wins when set
    let level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Import(args) => import::run(args, &cli.global).await,
        Commands::Run(args) => run::run(args, &cli.global).await,
        Commands::Feedback(args) => feedback::run(args, &cli.global).await,
        Commands::Compare(args) => compare::run(args, &cli.global).await,
        Commands::Config(args) => config::run(args, &cli.global).await,
    }
}
