//! Shot command - interactive screenshot

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::warn;

use capdrop_core::capture;

use super::{deliver, load_config};

/// Take a screenshot through the portal and upload it
pub async fn shot() -> Result<()> {
    let (config, _) = load_config()?;

    // Some portal backends fail the first request right after login
    let artifact = match capture::screenshot(&config).await {
        Err(e) if e.is_retryable() => {
            warn!("Screenshot failed ({}); retrying once", e);
            tokio::time::sleep(Duration::from_millis(config.capture.shot_retry_delay_ms)).await;
            capture::screenshot(&config).await
        }
        other => other,
    }
    .context("Screenshot failed")?;

    deliver(&config, &artifact).await?;
    Ok(())
}
