//! System audio source resolution for recordings
//!
//! Picks the monitor source that captures what the desktop is playing.
//! Resolution never fails: anything unexpected means "record without audio".

use serde::{Deserialize, Serialize};
use std::process::Command;
use tracing::{debug, warn};

/// Environment variable that forces a specific audio source
pub const AUDIO_OVERRIDE_ENV: &str = "CAPDROP_AUDIO_MONITOR";

/// How the recording's audio source is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioMode {
    /// Monitor of the default sink, or any monitor source
    #[default]
    Auto,
    /// Record video only
    None,
    /// Use `device` verbatim
    Device,
}

impl std::fmt::Display for AudioMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::None => write!(f, "none"),
            Self::Device => write!(f, "device"),
        }
    }
}

/// `[audio]` settings section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPolicy {
    #[serde(default)]
    pub mode: AudioMode,

    /// Source name used in `device` mode
    #[serde(default)]
    pub device: String,
}

/// Queries against the system audio server
pub trait AudioServer: Send + Sync {
    /// Name of the default output sink, if known
    fn default_sink(&self) -> Option<String>;

    /// Names of all capture sources
    fn sources(&self) -> Vec<String>;
}

/// [`AudioServer`] backed by `pactl`
#[derive(Debug, Clone, Default)]
pub struct Pactl;

impl Pactl {
    fn run(args: &[&str]) -> Option<String> {
        match Command::new("pactl").args(args).output() {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                debug!("pactl {:?} exited with {}", args, output.status);
                None
            }
            Err(e) => {
                debug!("pactl unavailable: {}", e);
                None
            }
        }
    }
}

impl AudioServer for Pactl {
    fn default_sink(&self) -> Option<String> {
        Self::run(&["info"]).and_then(|out| parse_default_sink(&out))
    }

    fn sources(&self) -> Vec<String> {
        Self::run(&["list", "short", "sources"])
            .map(|out| parse_source_names(&out))
            .unwrap_or_default()
    }
}

/// Extract the `Default Sink:` value from `pactl info` output
pub fn parse_default_sink(info: &str) -> Option<String> {
    info.lines()
        .find_map(|line| line.trim().strip_prefix("Default Sink:"))
        .map(|sink| sink.trim().to_string())
        .filter(|sink| !sink.is_empty())
}

/// Source names (second column) from `pactl list short sources`
pub fn parse_source_names(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

/// Decide which source, if any, the recording captures audio from
pub fn resolve_audio_source(
    env_override: Option<&str>,
    policy: &AudioPolicy,
    server: &dyn AudioServer,
) -> Option<String> {
    if let Some(source) = env_override.map(str::trim).filter(|s| !s.is_empty()) {
        debug!("Audio source forced by {}: {}", AUDIO_OVERRIDE_ENV, source);
        return Some(source.to_string());
    }

    match policy.mode {
        AudioMode::None => None,
        AudioMode::Device => {
            let device = policy.device.trim();
            if device.is_empty() {
                warn!("Audio mode is 'device' but no device is configured; recording without audio");
                None
            } else {
                Some(device.to_string())
            }
        }
        AudioMode::Auto => {
            if let Some(sink) = server.default_sink() {
                return Some(format!("{}.monitor", sink));
            }
            let source = server.sources().into_iter().find(|s| s.contains("monitor"));
            if source.is_none() {
                debug!("No monitor source found; recording without audio");
            }
            source
        }
    }
}
