//! Stop command - finish the active recording

use anyhow::{Context, Result};

use capdrop_core::recorder::StopOutcome;

use super::{announce, build_recorder, load_config};

/// Stop the active recording, upload it and print the link
pub async fn stop() -> Result<()> {
    let (config, settings_path) = load_config()?;
    let recorder = build_recorder(&config, settings_path);

    match recorder.stop().await.context("Failed to stop recording")? {
        StopOutcome::NothingActive => println!("No active recording."),
        StopOutcome::Uploaded { link, path } => {
            println!("Saved {}", path.display());
            announce(&config, &link).await;
        }
    }
    Ok(())
}
