//! Error types for capdrop

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using CapdropError
pub type Result<T> = std::result::Result<T, CapdropError>;

/// Main error type for capdrop operations
#[derive(Debug, Error)]
pub enum CapdropError {
    /// Malformed or unexpected portal reply, or a missing required result field
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The portal answered a request with a nonzero status
    #[error("Portal request {request} was cancelled or denied (status {code})")]
    CancelledOrDenied {
        /// Portal method that was answered
        request: String,
        /// Response status code (1 = cancelled by user, 2 = other)
        code: u32,
    },

    /// No Response signal arrived before the deadline
    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout {
        /// What was being waited on (request handle or method)
        what: String,
        /// Configured deadline
        after: Duration,
    },

    /// D-Bus transport failure (connection, method error)
    #[error("D-Bus error: {0}")]
    Bus(String),

    /// Every pipeline variant failed
    #[error("All {attempts} pipeline variants failed; last error: {last_error}")]
    PipelineExhausted {
        /// Number of variants tried
        attempts: usize,
        /// Diagnostic output of the last failed attempt
        last_error: String,
    },

    /// Child process could not be launched or controlled
    #[error("Process error: {0}")]
    Process(String),

    /// Persisted recording state is missing or inconsistent
    #[error("Recording state error: {0}")]
    State(String),

    /// Stopped recording produced no usable output
    #[error("Recording produced no output at {}", .0.display())]
    EmptyOutput(PathBuf),

    /// A recording is already active
    #[error("A recording is already active (pid {pid})")]
    RecordingActive {
        /// Pid of the active recorder
        pid: u32,
    },

    /// Selected region is empty or malformed
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// Region selection was cancelled by the user
    #[error("Region selection cancelled")]
    SelectionCancelled,

    /// Upload sink failure
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CapdropError>,
    },
}

impl CapdropError {
    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a process error
    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Create an upload error
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            after,
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers removed
    pub fn root(&self) -> &CapdropError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether a caller may reasonably retry the whole operation from scratch.
    ///
    /// Only portal-side failures qualify; the core itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            Self::Protocol(_) | Self::CancelledOrDenied { .. } | Self::Timeout { .. } | Self::Bus(_)
        )
    }

    /// Short hint shown to the user next to the error
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::Bus(_) | Self::Protocol(_) => {
                Some("Check that xdg-desktop-portal and a portal backend are running")
            }
            Self::CancelledOrDenied { .. } => Some("The capture request was cancelled in the portal dialog"),
            Self::Timeout { .. } => Some("The portal did not answer; raise [portal].timeout_secs in config.toml"),
            Self::PipelineExhausted { .. } | Self::Process(_) => {
                Some("Make sure gst-launch-1.0 and the PipeWire GStreamer plugin are installed")
            }
            Self::RecordingActive { .. } => Some("Stop the current recording with 'capdrop stop'"),
            Self::EmptyOutput(_) => Some("The recorder stopped before writing any frames"),
            Self::Upload(_) => Some("The file was kept; retry with 'capdrop upload <file>'"),
            Self::Config(_) => Some("Check ~/.config/capdrop/config.toml"),
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

// Conversions from external error types

impl From<zbus::Error> for CapdropError {
    fn from(err: zbus::Error) -> Self {
        Self::Bus(err.to_string())
    }
}

impl From<zbus::zvariant::Error> for CapdropError {
    fn from(err: zbus::zvariant::Error) -> Self {
        Self::Protocol(format!("Malformed portal message: {}", err))
    }
}

impl From<serde_json::Error> for CapdropError {
    fn from(err: serde_json::Error) -> Self {
        Self::State(format!("Invalid state file: {}", err))
    }
}

impl From<image::ImageError> for CapdropError {
    fn from(err: image::ImageError) -> Self {
        Self::Io(std::io::Error::other(err))
    }
}
