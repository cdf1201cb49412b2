//! Recording supervisor
//!
//! Starts a detached recording pipeline on a granted screencast, remembers it
//! in the state file, and later stops, validates and uploads the result,
//! possibly from a different process than the one that started it.
//!
//! ```text
//! start: acquire screencast ─▶ crop ─▶ audio ─▶ spawn pipeline ─▶ save state
//! stop:  claim state ─▶ end-of-stream ─▶ wait ─▶ validate ─▶ upload ─▶ clear
//! ```

mod state;

pub use state::{ClaimedState, RecordingState, StateStore};

use chrono::{DateTime, Local};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::audio::{self, AudioPolicy, AudioServer, Pactl};
use crate::capture::{remember_restore_token, timestamped_output};
use crate::config::{self, ConfigFile};
use crate::error::{CapdropError, Result};
use crate::geometry::{resolve_crop, MonitorGeometry};
use crate::pipeline::{record_args, LaunchCommand, RecordJob};
use crate::portal::{ScreencastGrant, ScreencastProvider};
use crate::process;
use crate::sink::{DesktopNotifier, Notifier, UploadSink};
use crate::types::{mime_for_path, Rect};

const NOTIFY_TITLE: &str = "capdrop";

/// How often `hold` checks the child
const HOLD_POLL: Duration = Duration::from_millis(200);

/// Settings the supervisor runs with
#[derive(Debug, Clone)]
pub struct RecorderOptions {
    /// Where recordings are written
    pub capture_dir: PathBuf,
    /// Pipeline launcher executable
    pub launcher: String,
    /// Geometry for streams that report none
    pub fallback_monitor: MonitorGeometry,
    /// How long `stop` waits for the recorder to exit
    pub stop_timeout: Duration,
    pub stop_step: Duration,
    /// File receiving the recorder's diagnostics
    pub log_path: PathBuf,
    /// Settings document a new restore token is merged into
    pub settings_path: Option<PathBuf>,
    /// Token from the previous grant
    pub restore_token: Option<String>,
    pub audio: AudioPolicy,
    /// Source forced from the environment
    pub audio_override: Option<String>,
}

impl RecorderOptions {
    pub fn from_config(config: &ConfigFile, settings_path: Option<PathBuf>) -> Self {
        Self {
            capture_dir: config.capture.video_dir(),
            launcher: config.pipeline.launcher.clone(),
            fallback_monitor: config.capture.fallback_monitor(),
            stop_timeout: config.pipeline.stop_timeout(),
            stop_step: Duration::from_millis(100),
            log_path: config::record_log_path(),
            settings_path,
            restore_token: config.portal.restore_token.clone(),
            audio: config.audio.clone(),
            audio_override: std::env::var(audio::AUDIO_OVERRIDE_ENV).ok(),
        }
    }
}

/// Result of `stop`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// No recording was active
    NothingActive,
    /// The recording was uploaded
    Uploaded { link: String, path: PathBuf },
}

/// Result of `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderStatus {
    Idle,
    Active {
        pid: u32,
        output_path: PathBuf,
        /// Whether the recorder process still runs
        alive: bool,
        started_at: Option<DateTime<Local>>,
    },
}

/// A recording started by this process
#[derive(Debug)]
pub struct ActiveRecording {
    output_path: PathBuf,
    pid: u32,
    child: Child,
    grant: ScreencastGrant,
}

impl ActiveRecording {
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Wait until the recorder exits and return its exit code, if known.
    ///
    /// The portal session stays open while this runs.
    pub async fn hold(&mut self) -> Result<Option<i32>> {
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Ok(status.code()),
                Ok(None) => tokio::time::sleep(HOLD_POLL).await,
                // already reaped by a stop in this process
                Err(e) if e.raw_os_error() == Some(libc::ECHILD) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Close the portal session
    pub async fn release(self) {
        self.grant.close().await;
    }
}

/// Starts and stops recordings
pub struct Recorder<P, U> {
    provider: P,
    uploader: U,
    store: StateStore,
    options: RecorderOptions,
    audio_server: Arc<dyn AudioServer>,
    notifier: Arc<dyn Notifier>,
}

impl<P: ScreencastProvider, U: UploadSink> Recorder<P, U> {
    pub fn new(provider: P, uploader: U, store: StateStore, options: RecorderOptions) -> Self {
        Self {
            provider,
            uploader,
            store,
            options,
            audio_server: Arc::new(Pactl),
            notifier: Arc::new(DesktopNotifier::default()),
        }
    }

    pub fn with_audio_server(mut self, server: Arc<dyn AudioServer>) -> Self {
        self.audio_server = server;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Whether a recording is active, judged by the state file alone
    pub fn is_active(&self) -> bool {
        self.store.exists()
    }

    pub fn status(&self) -> Result<RecorderStatus> {
        Ok(match self.store.load()? {
            None => RecorderStatus::Idle,
            Some(state) => RecorderStatus::Active {
                pid: state.pid,
                alive: process::pid_matches(state.pid, state.program.as_deref()),
                output_path: state.output_path,
                started_at: state.started_at,
            },
        })
    }

    /// Start recording `rect` at `fps` and return as soon as the pipeline
    /// runs
    pub async fn start(&self, fps: u32, rect: Rect) -> Result<ActiveRecording> {
        if rect.is_empty() {
            return Err(CapdropError::InvalidRegion(format!("{} has no area", rect)));
        }
        if let Some(state) = self.store.load()? {
            return Err(CapdropError::RecordingActive { pid: state.pid });
        }

        let grant = self.provider.acquire(self.options.restore_token.clone()).await?;
        remember_restore_token(
            self.options.restore_token.as_deref(),
            grant.session.restore_token.as_deref(),
            self.options.settings_path.as_deref(),
        );

        match self.launch(fps, rect, &grant).await {
            Ok((child, output_path)) => {
                let pid = child.id();
                info!("Recording {} to {} (pid {})", rect, output_path.display(), pid);
                self.notifier.notify(NOTIFY_TITLE, "Recording started");
                Ok(ActiveRecording {
                    output_path,
                    pid,
                    child,
                    grant,
                })
            }
            Err(e) => {
                grant.close().await;
                Err(e)
            }
        }
    }

    async fn launch(&self, fps: u32, rect: Rect, grant: &ScreencastGrant) -> Result<(Child, PathBuf)> {
        let monitor = grant.stream.monitor(self.options.fallback_monitor);
        let crop = resolve_crop(rect, monitor);
        debug!("monitor {:?}, crop {}", monitor, crop);

        std::fs::create_dir_all(&self.options.capture_dir)?;
        let output_path = timestamped_output(&self.options.capture_dir);

        let audio_source = self.resolve_audio().await;
        match &audio_source {
            Some(source) => info!("Recording audio from {}", source),
            None => debug!("Recording without audio"),
        }

        let job = RecordJob {
            node_id: grant.stream.node_id,
            fps,
            crop,
            output: output_path.clone(),
            audio_source,
        };
        let fd = grant.remote.duplicate_for_child()?;
        let command = LaunchCommand::new(&self.options.launcher, record_args(&job, fd.raw()));
        debug!("launch: {}", command.display());

        let child = command
            .to_std()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(self.log_target())
            .spawn()
            .map_err(|e| {
                CapdropError::process(format!("Failed to launch {}: {}", self.options.launcher, e))
            })?;
        // the child holds its own copy now
        drop(fd);

        let state = RecordingState::new(child.id(), &output_path)
            .with_program(&self.options.launcher)
            .started_now();
        if let Err(e) = self.store.save(&state) {
            let mut child = child;
            if let Err(kill) = child.kill() {
                debug!("kill after failed state save: {}", kill);
            }
            let _ = child.wait();
            return Err(e);
        }

        Ok((child, output_path))
    }

    async fn resolve_audio(&self) -> Option<String> {
        let server = Arc::clone(&self.audio_server);
        let policy = self.options.audio.clone();
        let env_override = self.options.audio_override.clone();
        tokio::task::spawn_blocking(move || {
            audio::resolve_audio_source(env_override.as_deref(), &policy, server.as_ref())
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Audio lookup failed: {}", e);
            None
        })
    }

    fn log_target(&self) -> Stdio {
        if let Some(parent) = self.options.log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match File::create(&self.options.log_path) {
            Ok(file) => Stdio::from(file),
            Err(e) => {
                warn!("Cannot write {}: {}", self.options.log_path.display(), e);
                Stdio::null()
            }
        }
    }

    /// Stop the active recording, validate its output and upload it
    pub async fn stop(&self) -> Result<StopOutcome> {
        match self.try_stop().await? {
            Some(outcome) => Ok(outcome),
            None => {
                self.notifier.notify(NOTIFY_TITLE, "No active recording");
                Ok(StopOutcome::NothingActive)
            }
        }
    }

    /// Like `stop`, but quietly returns None when there is nothing to stop
    /// or another `stop` already owns the recording
    pub async fn try_stop(&self) -> Result<Option<StopOutcome>> {
        let Some(claim) = self.store.claim()? else {
            return Ok(None);
        };
        // dropping the claim clears the state on every path below
        let state = claim.state.clone();

        self.finish_process(&state).await?;

        let path = state.output_path;
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            drop(claim);
            self.notifier.notify(NOTIFY_TITLE, "Record failed: no output");
            return Err(CapdropError::EmptyOutput(path));
        }
        info!("Recorded {} ({} bytes)", path.display(), size);

        self.notifier.notify(NOTIFY_TITLE, "Uploading video…");
        let uploaded = self.uploader.upload(&path, mime_for_path(&path)).await;
        drop(claim);

        match uploaded {
            Ok(link) => {
                self.notifier.notify(NOTIFY_TITLE, &format!("Uploaded video:\n{}", link));
                Ok(Some(StopOutcome::Uploaded { link, path }))
            }
            Err(e) => Err(e.with_context(format!("Recording kept at {}", path.display()))),
        }
    }

    async fn finish_process(&self, state: &RecordingState) -> Result<()> {
        let pid = state.pid;
        if !process::pid_matches(pid, state.program.as_deref()) {
            debug!("recorder pid {} is gone; checking output only", pid);
            return Ok(());
        }

        if let Err(e) = process::send_eos(pid) {
            warn!("{}", e);
        }
        let timeout = self.options.stop_timeout;
        let step = self.options.stop_step;
        let exited = tokio::task::spawn_blocking(move || process::wait_for_pid_exit(pid, timeout, step))
            .await
            .map_err(|e| CapdropError::process(format!("Stop wait failed: {}", e)))?;

        if !exited {
            warn!("Recorder pid {} did not exit within {:?}; killing", pid, timeout);
            if let Err(e) = process::force_kill(pid) {
                warn!("{}", e);
            }
        }
        Ok(())
    }
}
