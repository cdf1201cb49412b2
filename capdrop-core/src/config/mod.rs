//! Configuration types for capdrop
//!
//! The settings document lives in `config.toml`; see [`ConfigFile`].
//! Runtime components receive the pieces they need explicitly, nothing here
//! is global.

mod file;

pub use file::{
    sample_config, CaptureSettings, ConfigFile, PipelineSettings, PortalSettings,
    SelectorSettings, UploadSettings,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application directory name under the XDG config and video directories
pub const APP_DIR: &str = "capdrop";

/// Image format for screenshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Keep the portal's PNG
    #[default]
    Png,
    /// Re-encode to JPEG
    Jpeg,
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
        }
    }
}

/// Cursor capture mode requested from the screencast portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CursorMode {
    /// Hide cursor in capture
    Hidden,
    /// Show cursor embedded in capture frames
    #[default]
    Embedded,
    /// Cursor metadata only (compositor-dependent)
    Metadata,
}

impl CursorMode {
    /// Bit value on the portal wire
    pub fn portal_value(&self) -> u32 {
        match self {
            Self::Hidden => 1,
            Self::Embedded => 2,
            Self::Metadata => 4,
        }
    }
}

/// How long the portal should remember a granted source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistMode {
    /// Do not persist
    None,
    /// Persist while the application runs
    Transient,
    /// Persist until explicitly revoked
    #[default]
    Persistent,
}

impl PersistMode {
    /// Value on the portal wire
    pub fn portal_value(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Transient => 1,
            Self::Persistent => 2,
        }
    }
}

/// Per-user configuration directory (`~/.config/capdrop`)
pub fn config_dir() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join(APP_DIR)
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join(APP_DIR)
    } else {
        std::env::temp_dir().join(APP_DIR)
    }
}

/// Path of the persisted recording state
pub fn state_path() -> PathBuf {
    config_dir().join("record_state.json")
}

/// Where the long-running recorder writes its diagnostics
pub fn record_log_path() -> PathBuf {
    config_dir().join("record.log")
}

/// Default directory for recordings (`~/Videos/Capdrop`)
pub fn default_video_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Videos")))
        .unwrap_or_else(std::env::temp_dir)
        .join("Capdrop")
}
