//! Status command - show the active recording

use anyhow::Result;

use capdrop_core::recorder::RecorderStatus;

use super::{build_recorder, load_config};

/// Show whether a recording is active
pub async fn status() -> Result<()> {
    let (config, settings_path) = load_config()?;
    let recorder = build_recorder(&config, settings_path);

    match recorder.status()? {
        RecorderStatus::Idle => println!("State: idle"),
        RecorderStatus::Active {
            pid,
            output_path,
            alive,
            started_at,
        } => {
            println!("State:   recording");
            println!("  PID:     {}{}", pid, if alive { "" } else { " (not running)" });
            println!("  Output:  {}", output_path.display());
            if let Some(started) = started_at {
                println!("  Started: {}", started.format("%Y-%m-%d %H:%M:%S"));
            }
            if !alive {
                println!();
                println!("The recorder is gone; run 'capdrop stop' to upload what it wrote.");
            }
        }
    }
    Ok(())
}
