//! Photolake CLI - Publish folders of photos as albums in a lake
//!
//! Provides commands for:
//! - Listing, creating and removing albums
//! - Syncing an album with a local folder
//! - Inspecting and downloading album contents

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod gallery;
mod output;

use commands::album::AlbumCommand;
use context::AppContext;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "photolake", version, about = "Content-addressed photo albums in a storage lake")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage albums
    #[command(subcommand)]
    Album(AlbumCommand),
}

/// Log filter used when `RUST_LOG` is not set
fn default_filter(verbose: u8, configured: &str) -> &str {
    match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = context::load_config(cli.config.as_deref())?;

    // Setup tracing
    let filter = default_filter(cli.verbose, &config.logging.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight jobs");
            on_interrupt.cancel();
        }
    });

    let app = AppContext::new(&config, cancel)?;
    match cli.command {
        Commands::Album(cmd) => cmd.execute(format, &app).await,
    }
}
