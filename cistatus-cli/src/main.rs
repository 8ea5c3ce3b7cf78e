//! cistatus CLI - Command line interface for cistatus
//!
//! Turns the CI status table posted on a pull request into a single CI label.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cistatus_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{CheckArgs, ConfigArgs, HandleArgs, SyncArgs};

/// cistatus: keep pull request CI labels in line with the bot's CI table
#[derive(Parser, Debug)]
#[command(name = "cistatus")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (overrides the default location)
    #[arg(long, global = true, env = "CISTATUS_CONFIG")]
    config: Option<PathBuf>,

    /// Login of the account that posts CI tables (overrides config and env)
    #[arg(long, global = true, env = "CISTATUS_BOT_NAME")]
    bot_name: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Evaluate a CI comment offline
    #[command(visible_alias = "c")]
    Check(CheckArgs),

    /// Recompute the CI label of a pull request from its latest CI comment
    Sync(SyncArgs),

    /// Process a newly created pull request comment
    Handle(HandleArgs),

    /// Show current configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = Config::load_with_overrides(cli.config.as_deref(), cli.bot_name.clone())?;

    if cli.verbose {
        tracing::info!(
            bot_name = ?config.bot_name,
            repos = config.repos.len(),
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("cistatus {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Check(args)) => {
            args.execute(&config)?;
        }
        Some(Commands::Sync(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Handle(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Config(args)) => {
            args.execute(&config, cli.config.as_deref())?;
        }
        None => {
            println!("cistatus - CI labels from CI status tables");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
