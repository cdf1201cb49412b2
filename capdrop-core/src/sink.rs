//! Adapters for the desktop collaborators a capture hands off to
//!
//! The upload sink is the only one whose failure matters; notifications,
//! clipboard and browser are best-effort and only log when they fail.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::UploadSettings;
use crate::error::{CapdropError, Result};

/// Environment variable telling the upload command whether to publish
pub const PUBLISH_ENV: &str = "CAPDROP_PUBLISH";

/// Destination for finished captures
pub trait UploadSink {
    /// Upload `path` and return a shareable link
    fn upload(&self, path: &Path, mime: &str) -> impl Future<Output = Result<String>>;
}

/// Runs a configured command; the link is the last non-empty stdout line.
///
/// Placeholders `{file}`, `{mime}`, `{name}` and `{folder}` are substituted
/// in every argument.
#[derive(Debug, Clone)]
pub struct CommandUploader {
    pub command: Vec<String>,
    pub folder: String,
    pub publish: bool,
}

impl CommandUploader {
    pub fn new(command: Vec<String>, folder: impl Into<String>, publish: bool) -> Self {
        Self {
            command,
            folder: folder.into(),
            publish,
        }
    }

    /// Argument vector for one upload
    pub fn render(&self, path: &Path, mime: &str) -> Vec<String> {
        let file = path.display().to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.command
            .iter()
            .map(|arg| {
                arg.replace("{file}", &file)
                    .replace("{mime}", mime)
                    .replace("{name}", &name)
                    .replace("{folder}", &self.folder)
            })
            .collect()
    }
}

impl UploadSink for CommandUploader {
    async fn upload(&self, path: &Path, mime: &str) -> Result<String> {
        let argv = self.render(path, mime);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| CapdropError::upload("Upload command is empty"))?;

        debug!("upload: {:?}", argv);
        let output = Command::new(program)
            .args(args)
            .env(PUBLISH_ENV, if self.publish { "1" } else { "0" })
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CapdropError::upload(format!("Failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CapdropError::upload(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let link = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .ok_or_else(|| CapdropError::upload(format!("{} printed no link", program)))?;
        info!("Uploaded {}", path.display());
        Ok(link.to_string())
    }
}

/// Keeps files where they are and links to them with `file://`
#[derive(Debug, Clone, Default)]
pub struct LocalUploader;

impl UploadSink for LocalUploader {
    async fn upload(&self, path: &Path, _mime: &str) -> Result<String> {
        if !path.exists() {
            return Err(CapdropError::upload(format!("{} does not exist", path.display())));
        }
        let absolute = std::path::absolute(path).unwrap_or_else(|_| PathBuf::from(path));
        Ok(format!("file://{}", absolute.display()))
    }
}

/// Upload sink chosen from the `[upload]` settings
#[derive(Debug, Clone)]
pub enum Uploader {
    Command(CommandUploader),
    Local(LocalUploader),
}

impl Uploader {
    pub fn from_settings(settings: &UploadSettings) -> Self {
        if settings.command.is_empty() {
            Self::Local(LocalUploader)
        } else {
            Self::Command(CommandUploader::new(
                settings.command.clone(),
                settings.folder.clone(),
                settings.publish,
            ))
        }
    }
}

impl UploadSink for Uploader {
    async fn upload(&self, path: &Path, mime: &str) -> Result<String> {
        match self {
            Self::Command(uploader) => uploader.upload(path, mime).await,
            Self::Local(uploader) => uploader.upload(path, mime).await,
        }
    }
}

/// Desktop notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// `notify-send`, falling back to a log line
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    pub app_name: String,
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self {
            app_name: "capdrop".to_string(),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) {
        let status = std::process::Command::new("notify-send")
            .args(["--app-name", &self.app_name, title, body])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => {}
            _ => info!("[notify] {}: {}", title, body),
        }
    }
}

/// Put `text` on the clipboard with wl-copy, then xclip. Best-effort.
pub async fn copy_to_clipboard(text: &str) -> bool {
    let candidates: [(&str, &[&str]); 2] = [("wl-copy", &[]), ("xclip", &["-selection", "clipboard"])];
    for (program, args) in candidates {
        match pipe_to(program, args, text).await {
            Ok(()) => {
                debug!("copied link with {}", program);
                return true;
            }
            Err(e) => debug!("{} unavailable: {}", program, e),
        }
    }
    warn!("No clipboard tool worked; install wl-clipboard or xclip");
    false
}

async fn pipe_to(program: &str, args: &[&str], text: &str) -> std::io::Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).await?;
    }
    let status = child.wait().await?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("{} exited with {}", program, status)))
    }
}

/// Open `url` in the default browser. Best-effort.
pub fn open_link(url: &str) {
    let spawned = std::process::Command::new("xdg-open")
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    if let Err(e) = spawned {
        warn!("Failed to open {}: {}", url, e);
    }
}

/// Clipboard and browser follow-ups for a fresh link
pub async fn share_link(link: &str, settings: &UploadSettings) {
    if settings.copy_link {
        copy_to_clipboard(link).await;
    }
    if settings.open_browser && !link.starts_with("file://") {
        open_link(link);
    }
}
