//! Start command - begin a recording and hold it in the foreground

use anyhow::{Context, Result};
use clap::Args;
use tokio::signal;
use tracing::info;

use capdrop_core::recorder::StopOutcome;
use capdrop_core::selector::RegionSource;
use capdrop_core::types::Rect;
use capdrop_core::CapdropError;

use super::{announce, build_recorder, load_config};

/// Arguments for the start command
#[derive(Args)]
pub struct StartArgs {
    /// Framerate (default from config)
    #[arg(short, long)]
    fps: Option<u32>,

    /// Region as x,y,w,h; runs the selector when omitted
    #[arg(short, long)]
    region: Option<Rect>,
}

/// Start recording and wait until it is stopped
pub async fn start(args: StartArgs) -> Result<()> {
    let (config, settings_path) = load_config()?;
    let recorder = build_recorder(&config, settings_path);

    if let Some(state) = recorder.store().load()? {
        return Err(CapdropError::RecordingActive { pid: state.pid }.into());
    }

    let rect = RegionSource::from_args(args.region, &config.selector.command)
        .select()
        .await
        .context("No region selected")?;
    let fps = args.fps.unwrap_or(config.capture.fps);

    let mut active = recorder
        .start(fps, rect)
        .await
        .context("Failed to start recording")?;

    println!("Recording to {}", active.output_path().display());
    println!("Run 'capdrop stop' or press Ctrl+C to finish.\n");

    tokio::select! {
        code = active.hold() => info!("Recorder exited with {:?}", code?),
        _ = signal::ctrl_c() => println!("\nStopping..."),
    }

    // a concurrent 'capdrop stop' may already own the recording
    let outcome = recorder.try_stop().await;
    active.release().await;

    match outcome.context("Failed to finish recording")? {
        Some(StopOutcome::Uploaded { link, .. }) => announce(&config, &link).await,
        Some(StopOutcome::NothingActive) | None => {
            println!("Recording finished by 'capdrop stop'.")
        }
    }
    Ok(())
}
