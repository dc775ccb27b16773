mod commands;
mod output;
mod sim;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lectern_lib::GuardConfig;

use crate::output::OutputFormat;
use crate::sim::Pacer;

#[derive(Parser)]
#[command(name = "lectern")]
#[command(about = "Exercise Lectern's TTL cache and rate limiter against a simulated backend")]
struct Cli {
    /// Output format: table or json
    #[arg(long, default_value = "table", global = true)]
    output: String,

    /// TOML config file (LECTERN_* environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Advance a virtual clock instead of sleeping between calls
    #[arg(long, global = true)]
    simulated: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run memoized profile lookups through the TTL cache
    Cache(commands::cache::CacheArgs),
    /// Send throttled messages through the rate limiter
    Limit(commands::limit::LimitArgs),
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lectern=info".parse()?),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.output);
    let config = GuardConfig::load(cli.config.as_deref())?;
    let pacer = Pacer::new(cli.simulated);

    match &cli.command {
        Commands::Cache(args) => commands::cache::run(args, &config, &pacer, &format).await?,
        Commands::Limit(args) => commands::limit::run(args, &config, &pacer, &format).await?,
        Commands::Config => commands::config::run(&config, &format)?,
    }

    Ok(())
}
