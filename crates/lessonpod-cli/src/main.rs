//! `lessonpod` -- diagnostics CLI for the lessonpod voice layer.
//!
//! Provides the following subcommands:
//!
//! - `lessonpod flags` -- Show the resolved voice feature flags.
//! - `lessonpod audio` -- Check stream parameters against the audio contract.
//! - `lessonpod breaker` -- Inspect or drive the persisted circuit breaker.
//! - `lessonpod session` -- List, show or clear stored concierge sessions.
//! - `lessonpod probe` -- Open the configured voice endpoint and report back.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lessonpod", about = "lessonpod voice layer CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (overrides LESSONPOD_CONFIG and ~/.lessonpod/config.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Storage directory (overrides `storage_dir` from the config file).
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved voice feature flags as JSON.
    Flags,

    /// Validate a sample rate and chunk size against the audio contract.
    Audio(commands::audio::AudioArgs),

    /// Inspect or drive the voice circuit breaker.
    Breaker {
        #[command(subcommand)]
        action: commands::breaker::BreakerAction,
    },

    /// Manage stored concierge sessions.
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },

    /// Connect to the voice endpoint and report the first event.
    Probe(commands::probe::ProbeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let opts = commands::GlobalOpts {
        config: cli.config,
        storage_dir: cli.storage_dir,
    };

    match cli.command {
        Commands::Flags => commands::flags::run()?,
        Commands::Audio(args) => commands::audio::run(args)?,
        Commands::Breaker { action } => commands::breaker::run(action, &opts)?,
        Commands::Session { action } => commands::session::run(action, &opts)?,
        Commands::Probe(args) => commands::probe::run(args, &opts).await?,
    }

    Ok(())
}
