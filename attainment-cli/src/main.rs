use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod render;

use config::ConfigLoader;

#[derive(Parser)]
#[command(name = "attainment", about = "Course and program outcome attainment reports")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Local database file (overrides database.path)
    #[arg(long, global = true)]
    database: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute attainment and render every derived table
    Report(commands::report::ReportArgs),
    /// Check every lesson and fail if any is flagged
    Validate(commands::validate::ValidateArgs),
    /// Import a JSON catalog snapshot
    Import(commands::import::ImportArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ConfigLoader::load()?;
    if let Some(path) = cli.database {
        config.database.path = path;
        config.database.url = None;
    }

    match cli.command {
        Commands::Report(args) => commands::report::run(args, &config).await,
        Commands::Validate(args) => commands::validate::run(args, &config).await,
        Commands::Import(args) => commands::import::run(args, &config).await,
        Commands::Config(args) => commands::config::run(args, &config),
    }
}
