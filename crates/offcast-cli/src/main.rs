//! Offcast CLI - Download Coordination Demo
//!
//! Terminal stand-in for the mobile screens:
//! - downloads list and live watch view
//! - pause / resume / remove user intents
//! - point status queries
//! - a scripted walkthrough of the single-active-download policy
//!
//! Everything runs against the simulated SDK engine, so every command is
//! self-contained and deterministic.

use clap::{Parser, Subcommand};

mod commands;
mod output;

/// Offcast CLI - offline download toolkit
#[derive(Parser)]
#[command(name = "offcast-cli")]
#[command(author = "Offcast Team")]
#[command(version)]
#[command(about = "Offline download coordination demo", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the downloads list
    List,

    /// Watch download progress live
    Watch {
        /// Engine tick interval in milliseconds
        #[arg(short, long, default_value = "200")]
        interval: u64,

        /// How long to watch in seconds (0 = until nothing is active)
        #[arg(short, long, default_value = "0")]
        duration: u64,
    },

    /// Pause an active download
    Pause {
        /// Video id to pause
        video_id: String,
    },

    /// Resume a download, displacing whatever is active
    Resume {
        /// Video id to resume
        video_id: String,
    },

    /// Remove a download from the device
    Remove {
        /// Video id to remove
        video_id: String,
    },

    /// Point status query for a single video
    Status {
        /// Video id to query
        video_id: String,
    },

    /// Run the scripted single-active-download walkthrough
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .init();

    match cli.command {
        Commands::List => {
            commands::list(&cli.format).await?;
        }
        Commands::Watch { interval, duration } => {
            commands::watch(interval, duration).await?;
        }
        Commands::Pause { video_id } => {
            commands::pause(&video_id, &cli.format).await?;
        }
        Commands::Resume { video_id } => {
            commands::resume(&video_id, &cli.format).await?;
        }
        Commands::Remove { video_id } => {
            commands::remove(&video_id, &cli.format).await?;
        }
        Commands::Status { video_id } => {
            commands::status(&video_id, &cli.format).await?;
        }
        Commands::Demo => {
            commands::demo().await?;
        }
    }

    Ok(())
}
