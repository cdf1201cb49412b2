//! Record command - fixed-duration region recording

use anyhow::{Context, Result};
use clap::Args;
use std::time::Duration;

use capdrop_core::capture::{self, FixedRecording};
use capdrop_core::pipeline::GstRunner;
use capdrop_core::portal::PortalScreencast;
use capdrop_core::selector::RegionSource;
use capdrop_core::types::Rect;

use super::{deliver, load_config};

/// Arguments for the record command
#[derive(Args)]
pub struct RecordArgs {
    /// Length of the recording in seconds (default from config)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Framerate (default from config)
    #[arg(short, long)]
    fps: Option<u32>,

    /// Region as x,y,w,h; runs the selector when omitted
    #[arg(short, long)]
    region: Option<Rect>,
}

/// Record a region for a fixed time and upload it
pub async fn record(args: RecordArgs) -> Result<()> {
    let (config, settings_path) = load_config()?;

    let duration = Duration::from_secs(args.duration.unwrap_or(config.capture.duration));
    let fps = args.fps.unwrap_or(config.capture.fps);
    let recording = FixedRecording::from_config(&config, duration, fps, Some(settings_path));
    let region = RegionSource::from_args(args.region, &config.selector.command);
    let provider = PortalScreencast::new(config.portal.screencast_options());

    println!("Select a screen in the portal dialog, then the region to record.");
    let artifact = capture::record_fixed(&provider, &region, &recording, GstRunner::new(config.pipeline.grace()))
        .await
        .context("Recording failed")?;

    println!("Saved {}", artifact.path.display());
    deliver(&config, &artifact).await?;
    Ok(())
}
