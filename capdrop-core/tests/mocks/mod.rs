//! Mock infrastructure for testing
//!
//! Stand-ins for the portal, the upload sink, the audio server and the
//! pipeline launcher, so the workflows run without a desktop session.

#![allow(dead_code)]

use capdrop_core::audio::AudioServer;
use capdrop_core::error::{CapdropError, Result};
use capdrop_core::pipeline::{AttemptOutcome, AttemptRunner, LaunchCommand};
use capdrop_core::portal::{PortalSession, ScreencastGrant, ScreencastProvider, StreamDescriptor};
use capdrop_core::process::{ChildFd, RemoteHandle};
use capdrop_core::sink::{Notifier, UploadSink};
use capdrop_core::ScreenType;
use parking_lot::Mutex;
use std::fs::File;
use std::os::fd::OwnedFd;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Node id every fake stream reports
pub const FAKE_NODE: u32 = 44;

/// A remote handle backed by /dev/null
pub fn null_remote() -> RemoteHandle {
    let file = File::open("/dev/null").expect("open /dev/null");
    RemoteHandle::from(OwnedFd::from(file))
}

/// Screencast provider that grants a 1920x1080 monitor at the origin
#[derive(Clone, Default)]
pub struct FakeScreencast {
    /// Restore token handed out with each grant
    pub grant_token: Option<String>,
    /// Fail every acquisition with this message
    pub deny: Option<String>,
    /// Restore tokens passed to `acquire`, in call order
    pub calls: Arc<Mutex<Vec<Option<String>>>>,
}

impl FakeScreencast {
    pub fn granting(token: &str) -> Self {
        Self {
            grant_token: Some(token.to_string()),
            ..Self::default()
        }
    }

    pub fn denying(message: &str) -> Self {
        Self {
            deny: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl ScreencastProvider for FakeScreencast {
    async fn acquire(&self, restore_token: Option<String>) -> Result<ScreencastGrant> {
        self.calls.lock().push(restore_token);
        if let Some(message) = &self.deny {
            return Err(CapdropError::CancelledOrDenied {
                request: message.clone(),
                code: 1,
            });
        }
        Ok(ScreencastGrant::new(
            PortalSession {
                path: "/org/freedesktop/portal/desktop/session/1_1/capdrop_test".to_string(),
                screen_type: ScreenType::ScreenCast,
                restore_token: self.grant_token.clone(),
            },
            StreamDescriptor {
                node_id: FAKE_NODE,
                object_path: None,
                position: Some((0, 0)),
                size: Some((1920, 1080)),
                source_type: Some(1),
            },
            null_remote(),
        ))
    }
}

/// Upload sink that records what it was given
#[derive(Clone)]
pub struct FakeUploader {
    /// Link returned on success; None fails every upload
    pub link: Option<String>,
    /// Time each upload takes
    pub delay: Duration,
    pub uploads: Arc<Mutex<Vec<(PathBuf, String)>>>,
}

impl FakeUploader {
    pub fn succeeding(link: &str) -> Self {
        Self {
            link: Some(link.to_string()),
            delay: Duration::ZERO,
            uploads: Arc::default(),
        }
    }

    pub fn slow(link: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::succeeding(link)
        }
    }

    pub fn failing() -> Self {
        Self {
            link: None,
            delay: Duration::ZERO,
            uploads: Arc::default(),
        }
    }
}

impl UploadSink for FakeUploader {
    async fn upload(&self, path: &Path, mime: &str) -> Result<String> {
        self.uploads.lock().push((path.to_path_buf(), mime.to_string()));
        tokio::time::sleep(self.delay).await;
        self.link
            .clone()
            .ok_or_else(|| CapdropError::upload("remote rejected the file"))
    }
}

/// Audio server with a fixed answer
#[derive(Debug, Clone, Default)]
pub struct FakeAudioServer {
    pub default_sink: Option<String>,
    pub sources: Vec<String>,
}

impl FakeAudioServer {
    pub fn with_sink(sink: &str) -> Self {
        Self {
            default_sink: Some(sink.to_string()),
            sources: Vec::new(),
        }
    }
}

impl AudioServer for FakeAudioServer {
    fn default_sink(&self) -> Option<String> {
        self.default_sink.clone()
    }

    fn sources(&self) -> Vec<String> {
        self.sources.clone()
    }
}

/// Notifier that keeps every message body
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn bodies(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, _title: &str, body: &str) {
        self.messages.lock().push(body.to_string());
    }
}

/// Write an executable shell script named `name` into `dir`
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("stat script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// Fake recorder: writes `location=` on SIGINT and exits cleanly. The full
/// argv is saved next to the output as `<output>.args`.
pub const WRITING_RECORDER: &str = r#"out=""
for arg in "$@"; do
  case "$arg" in
    location=*) out="${arg#location=}" ;;
  esac
done
echo "$*" > "$out.args"
trap 'printf webm-bytes > "$out"; exit 0' INT
while true; do sleep 0.05; done
"#;

/// Fake recorder that exits on SIGINT without writing anything
pub const SILENT_RECORDER: &str = r#"trap 'exit 0' INT
while true; do sleep 0.05; done
"#;

/// Attempt runner that succeeds on one chosen attempt
#[derive(Debug, Default)]
pub struct FakeRunner {
    /// 1-based attempt that writes output; None never succeeds
    pub succeed_on: Option<usize>,
    /// Failed attempts leave a zero-byte file behind
    pub leave_empty_file: bool,
    pub commands: Vec<LaunchCommand>,
    pub durations: Vec<Duration>,
}

impl FakeRunner {
    pub fn succeeding_on(attempt: usize) -> Self {
        Self {
            succeed_on: Some(attempt),
            ..Self::default()
        }
    }

    pub fn never_succeeding() -> Self {
        Self::default()
    }
}

/// The `location=` argument of a pipeline command line
pub fn output_of(command: &LaunchCommand) -> PathBuf {
    command
        .args
        .iter()
        .find_map(|arg| arg.strip_prefix("location="))
        .map(PathBuf::from)
        .expect("pipeline has a filesink location")
}

impl AttemptRunner for FakeRunner {
    fn run(&mut self, command: &LaunchCommand, fd: ChildFd, duration: Duration) -> Result<AttemptOutcome> {
        assert!(fd.raw() >= 0);
        self.commands.push(command.clone());
        self.durations.push(duration);
        let attempt = self.commands.len();
        let output = output_of(command);

        if self.succeed_on == Some(attempt) {
            std::fs::write(&output, b"webm-bytes")?;
            return Ok(AttemptOutcome {
                exit_code: Some(0),
                stderr: String::new(),
            });
        }
        if self.leave_empty_file {
            std::fs::write(&output, b"")?;
        }
        Ok(AttemptOutcome {
            exit_code: Some(1),
            stderr: format!("attempt {} could not link pipewiresrc", attempt),
        })
    }
}
