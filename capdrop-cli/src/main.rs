//! Capdrop CLI
//!
//! Capture a screen region through the desktop portal and share it.
//!
//! # Usage
//!
//! ```bash
//! # Screenshot, upload, copy the link
//! capdrop shot
//!
//! # Record a region for 10 seconds
//! capdrop record --duration 10 --region 100,100,800,600
//!
//! # Start a recording, then finish it from anywhere
//! capdrop start
//! capdrop stop
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use capdrop_core::CapdropError;

/// Capdrop - capture a screen region and share it
#[derive(Parser)]
#[command(name = "capdrop")]
#[command(version)]
#[command(about = "Capture a screen region through the desktop portal and share it", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take an interactive screenshot and upload it
    Shot,

    /// Record a region for a fixed time and upload it
    Record(commands::RecordArgs),

    /// Start a recording that runs until 'capdrop stop'
    Start(commands::StartArgs),

    /// Stop the active recording and upload it
    Stop,

    /// Show the active recording
    Status,

    /// Upload an existing file
    Upload(commands::UploadArgs),

    /// Manage the configuration file
    Config(commands::ConfigArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("capdrop={}", level).parse()?)
                .add_directive(format!("capdrop_core={}", level).parse()?),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Shot => commands::shot().await,
        Commands::Record(args) => commands::record(args).await,
        Commands::Start(args) => commands::start(args).await,
        Commands::Stop => commands::stop().await,
        Commands::Status => commands::status().await,
        Commands::Upload(args) => commands::upload(args).await,
        Commands::Config(args) => commands::config(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        if let Some(hint) = e.downcast_ref::<CapdropError>().and_then(CapdropError::user_hint) {
            eprintln!("Hint: {}", hint);
        }
        std::process::exit(1);
    }
    Ok(())
}
