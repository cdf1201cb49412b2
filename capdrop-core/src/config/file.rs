//! Configuration file loading and saving
//!
//! Loads user configuration from `~/.config/capdrop/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::{config_dir, default_video_dir, CursorMode, ImageFormat, PersistMode};
use crate::audio::AudioPolicy;
use crate::error::{CapdropError, Result};
use crate::geometry::MonitorGeometry;
use crate::pipeline::{PixelFormat, TargetKey, VariantPolicy};
use crate::portal::ScreencastOptions;

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Capture defaults
    #[serde(default)]
    pub capture: CaptureSettings,

    /// Upload sink settings
    #[serde(default)]
    pub upload: UploadSettings,

    /// System audio policy for recordings
    #[serde(default)]
    pub audio: AudioPolicy,

    /// Portal negotiation settings
    #[serde(default)]
    pub portal: PortalSettings,

    /// Capture pipeline settings
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Region selector settings
    #[serde(default)]
    pub selector: SelectorSettings,
}

/// Capture defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Screenshot format (png, jpeg)
    #[serde(default)]
    pub image_format: ImageFormat,

    /// JPEG quality, 50-100
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Recording framerate
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Fixed-length recording duration in seconds
    #[serde(default = "default_duration")]
    pub duration: u64,

    /// Directory for recordings (default: ~/Videos/Capdrop)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_dir: Option<PathBuf>,

    /// Monitor width assumed when the portal does not report one
    #[serde(default = "default_fallback_width")]
    pub fallback_width: i32,

    /// Monitor height assumed when the portal does not report one
    #[serde(default = "default_fallback_height")]
    pub fallback_height: i32,

    /// Delay before the single screenshot retry, in milliseconds
    #[serde(default = "default_shot_retry_delay")]
    pub shot_retry_delay_ms: u64,
}

/// Upload sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Upload command; empty keeps files local.
    /// Placeholders: {file}, {mime}, {name}, {folder}
    #[serde(default)]
    pub command: Vec<String>,

    /// Destination folder handed to the command as {folder}
    #[serde(default)]
    pub folder: String,

    /// Ask the sink to make the link public
    #[serde(default = "default_true")]
    pub publish: bool,

    /// Copy the resulting link to the clipboard
    #[serde(default = "default_true")]
    pub copy_link: bool,

    /// Open the resulting link in the browser
    #[serde(default = "default_true")]
    pub open_browser: bool,
}

/// Portal negotiation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSettings {
    /// Seconds to wait for each portal Response signal
    #[serde(default = "default_portal_timeout")]
    pub timeout_secs: u64,

    /// Seconds to wait for OpenPipeWireRemote
    #[serde(default = "default_remote_timeout")]
    pub remote_timeout_secs: u64,

    /// Cursor mode (hidden, embedded, metadata)
    #[serde(default)]
    pub cursor_mode: CursorMode,

    /// Source selection persistence (none, transient, persistent)
    #[serde(default)]
    pub persist_mode: PersistMode,

    /// Ask the portal for audio alongside video
    #[serde(default = "default_true")]
    pub request_audio: bool,

    /// Token from the last granted screencast; written by capdrop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_token: Option<String>,
}

/// Capture pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Pipeline launcher executable
    #[serde(default = "default_launcher")]
    pub launcher: String,

    /// Capture-target keys to try, in order
    #[serde(default = "default_target_keys")]
    pub target_keys: Vec<TargetKey>,

    /// Pixel formats to try, in order
    #[serde(default = "default_formats")]
    pub formats: Vec<PixelFormat>,

    /// Whether to declare the framerate, in order
    #[serde(default = "default_framerate_options")]
    pub framerate_options: Vec<bool>,

    /// Seconds a pipeline may take to finish after end-of-stream
    #[serde(default = "default_grace")]
    pub grace_secs: u64,

    /// Seconds `stop` waits for the recorder to exit
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
}

/// Region selector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSettings {
    /// Command printing the selected region as `x,y,w,h` (empty disables)
    #[serde(default = "default_selector_command")]
    pub command: Vec<String>,
}

// Default value functions
fn default_jpeg_quality() -> u8 {
    90
}

fn default_fps() -> u32 {
    30
}

fn default_duration() -> u64 {
    5
}

fn default_fallback_width() -> i32 {
    1920
}

fn default_fallback_height() -> i32 {
    1080
}

fn default_shot_retry_delay() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_portal_timeout() -> u64 {
    60
}

fn default_remote_timeout() -> u64 {
    10
}

fn default_launcher() -> String {
    "gst-launch-1.0".to_string()
}

fn default_target_keys() -> Vec<TargetKey> {
    vec![TargetKey::Path, TargetKey::TargetObject, TargetKey::None]
}

fn default_formats() -> Vec<PixelFormat> {
    vec![PixelFormat::I420, PixelFormat::Bgrx, PixelFormat::Rgba]
}

fn default_framerate_options() -> Vec<bool> {
    vec![true, false]
}

fn default_grace() -> u64 {
    15
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_selector_command() -> Vec<String> {
    vec!["slurp".to_string(), "-f".to_string(), "%x,%y,%w,%h".to_string()]
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            image_format: ImageFormat::default(),
            jpeg_quality: default_jpeg_quality(),
            fps: default_fps(),
            duration: default_duration(),
            video_dir: None,
            fallback_width: default_fallback_width(),
            fallback_height: default_fallback_height(),
            shot_retry_delay_ms: default_shot_retry_delay(),
        }
    }
}

impl CaptureSettings {
    /// Directory recordings are written to
    pub fn video_dir(&self) -> PathBuf {
        self.video_dir.clone().unwrap_or_else(default_video_dir)
    }

    /// Geometry assumed for streams without position/size
    pub fn fallback_monitor(&self) -> MonitorGeometry {
        MonitorGeometry::new(0, 0, self.fallback_width, self.fallback_height)
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            folder: String::new(),
            publish: true,
            copy_link: true,
            open_browser: true,
        }
    }
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_portal_timeout(),
            remote_timeout_secs: default_remote_timeout(),
            cursor_mode: CursorMode::default(),
            persist_mode: PersistMode::default(),
            request_audio: true,
            restore_token: None,
        }
    }
}

impl PortalSettings {
    /// Options for screencast negotiation
    pub fn screencast_options(&self) -> ScreencastOptions {
        ScreencastOptions {
            multiple: true,
            cursor_mode: self.cursor_mode,
            persist_mode: self.persist_mode,
            audio: self.request_audio,
            timeout: self.timeout(),
            remote_timeout: Duration::from_secs(self.remote_timeout_secs),
        }
    }

    /// Deadline for each Response signal
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            launcher: default_launcher(),
            target_keys: default_target_keys(),
            formats: default_formats(),
            framerate_options: default_framerate_options(),
            grace_secs: default_grace(),
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

impl PipelineSettings {
    /// Variant search ordering
    pub fn policy(&self) -> VariantPolicy {
        VariantPolicy {
            target_keys: self.target_keys.clone(),
            formats: self.formats.clone(),
            framerate_options: self.framerate_options.clone(),
        }
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            command: default_selector_command(),
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| CapdropError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| CapdropError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Reject values the capture pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(50..=100).contains(&self.capture.jpeg_quality) {
            return Err(CapdropError::config(format!(
                "capture.jpeg_quality must be between 50 and 100, got {}",
                self.capture.jpeg_quality
            )));
        }
        if self.capture.fps == 0 {
            return Err(CapdropError::config("capture.fps must be positive"));
        }
        if self.capture.fallback_width <= 0 || self.capture.fallback_height <= 0 {
            return Err(CapdropError::config("capture fallback size must be positive"));
        }
        if self.pipeline.launcher.trim().is_empty() {
            return Err(CapdropError::config("pipeline.launcher must not be empty"));
        }
        if self.pipeline.policy().is_empty() {
            return Err(CapdropError::config(
                "pipeline target_keys, formats and framerate_options must not be empty",
            ));
        }
        Ok(())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CapdropError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CapdropError::Config(format!("Failed to serialize config: {}", e)))?;

        // Write-then-rename so a crash never leaves a truncated settings file
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, content)
            .map_err(|e| CapdropError::Config(format!("Failed to write config file: {}", e)))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| CapdropError::Config(format!("Failed to replace config file: {}", e)))?;

        debug!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Merge a restore token into the settings document at `path`,
    /// overwriting any previous one
    pub fn store_restore_token(path: impl AsRef<Path>, token: &str) -> Result<()> {
        let path = path.as_ref();
        let mut config = Self::load_from(path)?;
        if config.portal.restore_token.as_deref() == Some(token) {
            return Ok(());
        }
        config.portal.restore_token = Some(token.to_string());
        config.save_to(path)?;
        info!("Saved screencast restore token");
        Ok(())
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# capdrop configuration

[capture]
# Screenshot format: png, jpeg
image_format = "png"

# JPEG quality (50-100), used when image_format = "jpeg"
jpeg_quality = 90

# Recording framerate and fixed-length duration (seconds)
fps = 30
duration = 5

# Directory for recordings (default: ~/Videos/Capdrop)
# video_dir = "/home/me/Videos/Capdrop"

# Monitor size assumed when the portal does not report one
fallback_width = 1920
fallback_height = 1080

# Delay before retrying a failed screenshot once (milliseconds)
shot_retry_delay_ms = 600

[upload]
# Command that uploads {file} and prints the shareable link on its last line.
# Placeholders: {file}, {mime}, {name}, {folder}. Leave empty to keep files local.
command = []
folder = ""
publish = true
copy_link = true
open_browser = true

[audio]
# System audio for recordings: auto, none, device
mode = "auto"
# Source name used when mode = "device"
device = ""

[portal]
timeout_secs = 60
remote_timeout_secs = 10
# Cursor: hidden, embedded, metadata
cursor_mode = "embedded"
# Remember the selected monitor: none, transient, persistent
persist_mode = "persistent"
request_audio = true

[pipeline]
launcher = "gst-launch-1.0"
# Tried in order until one produces output
target_keys = ["path", "target-object", "none"]
formats = ["I420", "BGRx", "RGBA"]
framerate_options = [true, false]
grace_secs = 15
stop_timeout_secs = 10

[selector]
# Prints the selected region as x,y,w,h
command = ["slurp", "-f", "%x,%y,%w,%h"]
"#
    .to_string()
}
