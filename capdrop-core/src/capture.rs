//! Capture workflows: interactive screenshot and fixed-duration recording

use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::error::{CapdropError, Result};
use crate::geometry::{resolve_crop, MonitorGeometry};
use crate::pipeline::{AttemptRunner, CaptureJob, SearchPlan, VariantPolicy, VariantSearch};
use crate::portal::{take_screenshot, BusTransport, ScreencastProvider, ScreenshotOptions};
use crate::selector::RegionSource;
use crate::types::Artifact;

/// Take an interactive screenshot with the configured format
pub async fn screenshot(config: &ConfigFile) -> Result<Artifact> {
    let transport = BusTransport::connect(config.portal.timeout()).await?;
    let options = ScreenshotOptions {
        format: config.capture.image_format,
        jpeg_quality: config.capture.jpeg_quality,
        output_dir: std::env::temp_dir(),
    };
    take_screenshot(&transport, &options).await
}

/// `REC_<timestamp>.webm` inside `dir`
pub fn timestamped_output(dir: &Path) -> PathBuf {
    dir.join(Local::now().format("REC_%Y%m%d_%H%M%S.webm").to_string())
}

/// Merge a newly granted restore token into the settings document.
/// Best-effort; an unchanged token is not rewritten.
pub fn remember_restore_token(previous: Option<&str>, granted: Option<&str>, settings: Option<&Path>) {
    let (Some(token), Some(path)) = (granted, settings) else {
        return;
    };
    if previous == Some(token) {
        return;
    }
    if let Err(e) = ConfigFile::store_restore_token(path, token) {
        warn!("Failed to save restore token: {}", e);
    }
}

/// A fixed-duration region recording
#[derive(Debug, Clone)]
pub struct FixedRecording {
    pub launcher: String,
    pub policy: VariantPolicy,
    pub fps: u32,
    pub duration: Duration,
    pub video_dir: PathBuf,
    pub fallback_monitor: MonitorGeometry,
    pub restore_token: Option<String>,
    pub settings_path: Option<PathBuf>,
}

impl FixedRecording {
    pub fn from_config(config: &ConfigFile, duration: Duration, fps: u32, settings_path: Option<PathBuf>) -> Self {
        Self {
            launcher: config.pipeline.launcher.clone(),
            policy: config.pipeline.policy(),
            fps,
            duration,
            video_dir: config.capture.video_dir(),
            fallback_monitor: config.capture.fallback_monitor(),
            restore_token: config.portal.restore_token.clone(),
            settings_path,
        }
    }
}

/// Record a region for a fixed time, trying pipeline variants until one
/// produces output.
///
/// The screencast is negotiated before the region is chosen so the user
/// answers the portal dialog first.
pub async fn record_fixed<P, R>(
    provider: &P,
    region: &RegionSource,
    recording: &FixedRecording,
    runner: R,
) -> Result<Artifact>
where
    P: ScreencastProvider,
    R: AttemptRunner + Send + 'static,
{
    let grant = provider.acquire(recording.restore_token.clone()).await?;
    remember_restore_token(
        recording.restore_token.as_deref(),
        grant.session.restore_token.as_deref(),
        recording.settings_path.as_deref(),
    );

    let rect = match region.select().await {
        Ok(rect) => rect,
        Err(e) => {
            grant.close().await;
            return Err(e);
        }
    };

    let monitor = grant.stream.monitor(recording.fallback_monitor);
    let crop = resolve_crop(rect, monitor);
    debug!("region {} on {:?}: {}", rect, monitor, crop);

    if let Err(e) = std::fs::create_dir_all(&recording.video_dir) {
        grant.close().await;
        return Err(e.into());
    }

    let plan = SearchPlan {
        launcher: recording.launcher.clone(),
        policy: recording.policy.clone(),
        node_id: grant.stream.node_id,
        job: CaptureJob {
            fps: recording.fps,
            crop,
            output: timestamped_output(&recording.video_dir),
        },
        duration: recording.duration,
    };

    info!("Recording {} for {:?}", rect, plan.duration);
    let (grant, result) = tokio::task::spawn_blocking(move || {
        let mut search = VariantSearch::new(runner);
        let result = search.run(&grant.remote, &plan);
        (grant, result)
    })
    .await
    .map_err(|e| CapdropError::process(format!("Capture task failed: {}", e)))?;

    grant.close().await;
    result.map(Artifact::from_path)
}
