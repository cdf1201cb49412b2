//! Persisted recording state
//!
//! The state file is the only durable record of a running recorder. Its
//! presence means "a recording is active"; it survives crashes of the
//! process that started it so a later `stop` can still finish the job.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{CapdropError, Result};

/// What a later `stop` needs to finish a recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingState {
    /// Recorder process id
    pub pid: u32,

    /// Output file
    #[serde(rename = "file")]
    pub output_path: PathBuf,

    /// Executable the pid was running when recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,

    /// When the recording started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Local>>,
}

impl RecordingState {
    pub fn new(pid: u32, output_path: impl Into<PathBuf>) -> Self {
        Self {
            pid,
            output_path: output_path.into(),
            program: None,
            started_at: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn started_now(mut self) -> Self {
        self.started_at = Some(Local::now());
        self
    }
}

/// JSON file holding at most one [`RecordingState`]
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the state; None when no recording is active.
    ///
    /// An unreadable file is an error rather than "idle" so a live recorder
    /// is never forgotten silently.
    pub fn load(&self) -> Result<Option<RecordingState>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CapdropError::state(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        let state: RecordingState = serde_json::from_str(&content)?;
        Ok(Some(state))
    }

    /// Take ownership of the active recording for stopping.
    ///
    /// The state file is renamed aside, so of several concurrent callers
    /// exactly one gets the state; the others see None. A state file that
    /// does not parse is moved to `<name>.corrupt` and reported as an error.
    pub fn claim(&self) -> Result<Option<ClaimedState>> {
        let claimed = self.sibling(".stopping");
        match std::fs::rename(&self.path, &claimed) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CapdropError::state(format!(
                    "Failed to claim {}: {}",
                    self.path.display(),
                    e
                )))
            }
        }

        let parsed = std::fs::read_to_string(&claimed)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<RecordingState>(&content).map_err(|e| e.to_string())
            });
        match parsed {
            Ok(state) => Ok(Some(ClaimedState { state, path: claimed })),
            Err(e) => {
                let corrupt = self.sibling(".corrupt");
                warn!("Moving unreadable recording state to {}: {}", corrupt.display(), e);
                if let Err(rename) = std::fs::rename(&claimed, &corrupt) {
                    warn!("Failed to keep {}: {}", claimed.display(), rename);
                    let _ = std::fs::remove_file(&claimed);
                }
                Err(CapdropError::state(format!(
                    "Invalid state file: {} (moved to {})",
                    e,
                    corrupt.display()
                )))
            }
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    pub fn save(&self, state: &RecordingState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, content)?;
        debug!("Saved recording state to {:?}", self.path);
        Ok(())
    }
}

/// A recording state owned by one `stop`; the claimed file is removed on drop
#[derive(Debug)]
pub struct ClaimedState {
    pub state: RecordingState,
    path: PathBuf,
}

impl Drop for ClaimedState {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Released recording state"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/record_state.json"));
        assert_eq!(store.load().unwrap(), None);

        let state = RecordingState::new(4242, "/v/REC_20240101_120000.webm")
            .with_program("gst-launch-1.0")
            .started_now();
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), Some(state));

        drop(store.claim().unwrap());
        assert!(!store.exists());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_minimal_state_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record_state.json");
        std::fs::write(&path, r#"{"pid": 77, "file": "/tmp/REC.webm"}"#).unwrap();
        let state = StateStore::new(&path).load().unwrap().unwrap();
        assert_eq!(state.pid, 77);
        assert_eq!(state.output_path, PathBuf::from("/tmp/REC.webm"));
        assert!(state.program.is_none());
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record_state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(StateStore::new(&path).load(), Err(CapdropError::State(_))));
    }

    #[test]
    fn test_claim_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("record_state.json"));
        store.save(&RecordingState::new(4242, "/v/REC.webm")).unwrap();

        let claim = store.claim().unwrap().unwrap();
        assert_eq!(claim.state.pid, 4242);
        assert!(!store.exists());
        assert!(store.claim().unwrap().is_none());

        drop(claim);
        assert!(!dir.path().join("record_state.json.stopping").exists());
    }

    #[test]
    fn test_claim_quarantines_corrupt_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record_state.json");
        std::fs::write(&path, r#"{"pid": 12"#).unwrap();
        let store = StateStore::new(&path);

        assert!(matches!(store.claim(), Err(CapdropError::State(_))));
        assert!(!store.exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("record_state.json.corrupt")).unwrap(),
            r#"{"pid": 12"#
        );
        assert!(store.claim().unwrap().is_none());
    }
}
