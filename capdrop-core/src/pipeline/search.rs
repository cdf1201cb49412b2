//! Multi-variant pipeline search for fixed-duration captures

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::launch::{capture_args, CaptureJob, LaunchCommand};
use super::variant::VariantPolicy;
use crate::error::{CapdropError, Result};
use crate::process::{self, ChildFd, RemoteHandle};

/// Shortest capture the search will run
pub const MIN_DURATION: Duration = Duration::from_secs(1);

/// Result of one pipeline attempt
#[derive(Debug, Clone, Default)]
pub struct AttemptOutcome {
    /// Exit code, None if killed by a signal
    pub exit_code: Option<i32>,
    /// Tail of the child's diagnostic output
    pub stderr: String,
}

impl AttemptOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs one pipeline attempt to completion
pub trait AttemptRunner {
    /// Launch `command` holding `fd`, let it run for `duration`, then end
    /// the stream and wait for exit. `fd` is closed when this returns.
    fn run(&mut self, command: &LaunchCommand, fd: ChildFd, duration: Duration) -> Result<AttemptOutcome>;
}

/// [`AttemptRunner`] that spawns real gst-launch processes
#[derive(Debug, Clone)]
pub struct GstRunner {
    /// How long a pipeline may take to finalize after end-of-stream
    pub grace: Duration,
}

impl GstRunner {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }
}

impl AttemptRunner for GstRunner {
    fn run(&mut self, command: &LaunchCommand, fd: ChildFd, duration: Duration) -> Result<AttemptOutcome> {
        debug!("launch: {}", command.display());
        let mut child = command
            .to_std()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CapdropError::process(format!("Failed to launch {}: {}", command.program, e)))?;
        let drain = process::drain_stderr(child.stderr.take());

        std::thread::sleep(duration);
        if let Err(e) = process::send_eos(child.id()) {
            debug!("end-of-stream not delivered: {}", e);
        }
        let status = process::wait_child_with_grace(&mut child, self.grace)?;
        drop(fd);

        let stderr = drain.join().unwrap_or_default();
        Ok(AttemptOutcome {
            exit_code: status.code(),
            stderr,
        })
    }
}

/// Everything one search needs besides the descriptor
#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub launcher: String,
    pub policy: VariantPolicy,
    pub node_id: u32,
    pub job: CaptureJob,
    pub duration: Duration,
}

/// Tries pipeline variants in policy order until one produces output
pub struct VariantSearch<R: AttemptRunner> {
    runner: R,
}

impl<R: AttemptRunner> VariantSearch<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Run the search. The remote descriptor stays owned by the caller; each
    /// attempt gets its own duplicate.
    pub fn run(&mut self, remote: &RemoteHandle, plan: &SearchPlan) -> Result<PathBuf> {
        let variants = plan.policy.variants(plan.node_id);
        let duration = plan.duration.max(MIN_DURATION);
        let output = &plan.job.output;
        let mut last_error = String::from("no variants configured");
        let mut attempts = 0;

        for variant in &variants {
            attempts += 1;
            debug!("variant {}/{}: {}", attempts, variants.len(), variant);

            let fd = remote.duplicate_for_child()?;
            let command = LaunchCommand::new(&plan.launcher, capture_args(&plan.job, variant, fd.raw()));

            match self.runner.run(&command, fd, duration) {
                Ok(outcome) if outcome.succeeded() && non_empty(output) => {
                    info!("Captured {} with {}", output.display(), variant);
                    return Ok(output.clone());
                }
                Ok(outcome) => {
                    debug!("variant failed (exit {:?}): {}", outcome.exit_code, outcome.stderr);
                    last_error = if outcome.stderr.is_empty() {
                        format!("exit status {:?}", outcome.exit_code)
                    } else {
                        outcome.stderr
                    };
                }
                Err(e) => {
                    debug!("variant could not run: {}", e);
                    last_error = e.to_string();
                }
            }
            remove_if_empty(output);
        }

        warn!("All {} pipeline variants failed", attempts);
        Err(CapdropError::PipelineExhausted { attempts, last_error })
    }
}

fn non_empty(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

fn remove_if_empty(path: &Path) {
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.len() == 0 {
            if let Err(e) = std::fs::remove_file(path) {
                debug!("could not remove empty output {}: {}", path.display(), e);
            }
        }
    }
}
