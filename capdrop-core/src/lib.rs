//! Capdrop Core Library
//!
//! Capture a screen region through xdg-desktop-portal and hand it to an
//! upload sink.
//!
//! This library provides:
//! - A portal client for Screenshot and ScreenCast sessions over D-Bus
//! - Crop geometry for region capture on multi-monitor layouts
//! - gst-launch pipelines with variant fallback for fixed-length captures
//! - A crash-recoverable recording supervisor
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐    ┌──────────────┐    ┌───────────────┐    ┌─────────────┐
//! │ Portal Session │───▶│ Crop Geometry│───▶│ Pipeline      │───▶│ Upload Sink │
//! │ (node + fd)    │    │ (selection)  │    │ (gst-launch)  │    │ (link)      │
//! └────────────────┘    └──────────────┘    └───────────────┘    └─────────────┘
//! ```

pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod portal;
pub mod process;
pub mod recorder;
pub mod selector;
pub mod sink;
pub mod types;

pub use config::ConfigFile;
pub use error::{CapdropError, Result};
pub use recorder::{Recorder, RecorderOptions, StopOutcome};
pub use types::{Artifact, Rect, ScreenType};
