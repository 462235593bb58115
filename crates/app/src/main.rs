use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod driver;
mod source;

#[derive(Parser)]
#[command(name = "assess", about = "Adaptive skill assessment with a study roadmap")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite URL holding the catalog and stored outcomes
    #[arg(long, env = "ASSESS_DB_URL", global = true)]
    db: Option<String>,

    /// JSON catalog of modules, lessons and questions
    #[arg(long, env = "ASSESS_CATALOG", global = true)]
    catalog: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the modules available for assessment
    Modules,
    /// Run one assessment and print the roadmap
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Module to assess; asked interactively when omitted
    #[arg(long, env = "ASSESS_MODULE_ID")]
    module: Option<u64>,

    /// Seconds allowed per question
    #[arg(long, env = "ASSESS_TIME_LIMIT_SECS", default_value_t = 45)]
    time_limit: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let storage = source::open(cli.db.as_deref(), cli.catalog.as_deref()).await?;

    match cli.command {
        Commands::Modules => driver::list_modules(&storage).await,
        Commands::Run(args) => driver::run(storage, args.module, args.time_limit).await,
    }
}
