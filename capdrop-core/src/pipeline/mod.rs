//! Capture pipeline construction and variant search
//!
//! The portal only promises a PipeWire descriptor and node id; which
//! `pipewiresrc` targeting property and raw pixel format a given system
//! accepts varies, so fixed-duration captures try combinations in order
//! until one produces a non-empty file.

mod launch;
mod search;
mod variant;

pub use launch::{capture_args, record_args, CaptureJob, LaunchCommand, RecordJob};
pub use search::{AttemptOutcome, AttemptRunner, GstRunner, SearchPlan, VariantSearch};
pub use variant::{PipelineVariant, PixelFormat, TargetKey, VariantPolicy};
