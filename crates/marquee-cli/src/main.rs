//! Marquee CLI - presentation replay and license renewal tools
//!
//! Features:
//! - Replay recorded player event timelines through the presentation machine
//! - Inspect app catalogs (local or remote)
//! - List persisted license renewal records
//! - Run the renewal scheduler for an offline stream list

use clap::{Parser, Subcommand};
use marquee_core::MarqueeConfig;
use std::path::PathBuf;

mod commands;
mod output;

/// Marquee CLI - player presentation and DRM renewal toolkit
#[derive(Parser)]
#[command(name = "marquee")]
#[command(version)]
#[command(about = "Player presentation and DRM renewal toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded event timeline through the presentation machine
    Replay {
        /// Path to the timeline (JSON array of events)
        timeline: PathBuf,
    },

    /// List the sections and items of a catalog
    Catalog {
        /// URL or path to the catalog JSON
        source: String,
    },

    /// Show persisted license renewal records
    Renewals {
        /// Renewal store file
        #[arg(short, long)]
        store: PathBuf,
    },

    /// Keep licenses of DRM streams renewed until interrupted
    Watch {
        /// Renewal store file
        #[arg(short, long)]
        store: PathBuf,

        /// Offline stream list (JSON array of streams)
        #[arg(long)]
        streams: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .init();

    marquee_core::init();

    let config = match &cli.config {
        Some(path) => MarqueeConfig::load(path)?,
        None => MarqueeConfig::default(),
    };

    match cli.command {
        Commands::Replay { timeline } => {
            commands::replay(&timeline, &cli.format)?;
        }
        Commands::Catalog { source } => {
            commands::catalog(&source, &cli.format).await?;
        }
        Commands::Renewals { store } => {
            commands::renewals(&store, &cli.format)?;
        }
        Commands::Watch { store, streams } => {
            commands::watch(&store, &streams, &config, &cli.format).await?;
        }
    }

    Ok(())
}
