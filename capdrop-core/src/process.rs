//! Child-process plumbing for capture pipelines
//!
//! Owns the PipeWire remote descriptor, hands out per-child duplicates, and
//! signals/waits on pipeline processes. Everything here blocks and is meant
//! to run on the blocking pool.

use std::io::Read;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::process::{Child, ExitStatus};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{CapdropError, Result};

/// Poll interval while waiting for a child to exit
const POLL_STEP: Duration = Duration::from_millis(50);

/// Diagnostic bytes kept from a child's stderr
const STDERR_TAIL: usize = 4096;

/// PipeWire remote descriptor returned by OpenPipeWireRemote.
///
/// Exclusively owned; closed when dropped.
#[derive(Debug)]
pub struct RemoteHandle(OwnedFd);

impl RemoteHandle {
    pub fn new(fd: OwnedFd) -> Self {
        Self(fd)
    }

    /// Raw descriptor number, for logging
    pub fn raw(&self) -> RawFd {
        self.0.as_raw_fd()
    }

    /// Duplicate the descriptor for one child process.
    ///
    /// The duplicate is inheritable (no close-on-exec) so the child sees it
    /// under the number passed on its command line.
    pub fn duplicate_for_child(&self) -> Result<ChildFd> {
        // SAFETY: dup() on a descriptor we own; the result is checked below.
        let fd = unsafe { libc::dup(self.0.as_raw_fd()) };
        if fd < 0 {
            return Err(CapdropError::process(format!(
                "Failed to duplicate PipeWire descriptor: {}",
                std::io::Error::last_os_error()
            )));
        }
        // SAFETY: fd is a fresh descriptor nothing else owns.
        Ok(ChildFd(unsafe { OwnedFd::from_raw_fd(fd) }))
    }
}

impl From<OwnedFd> for RemoteHandle {
    fn from(fd: OwnedFd) -> Self {
        Self(fd)
    }
}

/// One pipeline attempt's copy of the remote descriptor; closed on drop
#[derive(Debug)]
pub struct ChildFd(OwnedFd);

impl ChildFd {
    pub fn raw(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

fn signal(pid: u32, sig: libc::c_int) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    if pid <= 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "refusing to signal a process group",
        ));
    }
    // SAFETY: kill() has no memory-safety preconditions.
    if unsafe { libc::kill(pid, sig) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Ask a pipeline to finish its stream and exit (SIGINT makes gst-launch
/// send end-of-stream)
pub fn send_eos(pid: u32) -> Result<()> {
    debug!("Sending end-of-stream to pid {}", pid);
    signal(pid, libc::SIGINT)
        .map_err(|e| CapdropError::process(format!("Failed to signal pid {}: {}", pid, e)))
}

/// Kill a process outright
pub fn force_kill(pid: u32) -> Result<()> {
    signal(pid, libc::SIGKILL)
        .map_err(|e| CapdropError::process(format!("Failed to kill pid {}: {}", pid, e)))
}

/// Whether `pid` names a running, non-zombie process.
///
/// Reaps the process if it is an exited child of ours.
pub fn pid_alive(pid: u32) -> bool {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    let mut status = 0;
    // SAFETY: waitpid() writes only into `status`.
    let reaped = unsafe { libc::waitpid(raw, &mut status, libc::WNOHANG) };
    if reaped == raw {
        return false;
    }
    if reaped == 0 {
        return true;
    }

    // Not our child: probe with signal 0
    match signal(pid, 0) {
        Ok(()) => !is_zombie(pid),
        Err(e) => e.raw_os_error() == Some(libc::EPERM),
    }
}

fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            // state follows the parenthesised command name
            let after = stat.rsplit_once(')')?.1;
            after.split_whitespace().next().map(|s| s == "Z")
        })
        .unwrap_or(false)
}

/// Command name of `pid` from `/proc/<pid>/comm`
pub fn process_name(pid: u32) -> Option<String> {
    std::fs::read_to_string(format!("/proc/{}/comm", pid))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Whether a persisted pid may still be signalled.
///
/// A dead pid, or one now running a different program, is stale.
pub fn pid_matches(pid: u32, program: Option<&str>) -> bool {
    if !pid_alive(pid) {
        return false;
    }
    let (Some(program), Some(comm)) = (program, process_name(pid)) else {
        return true;
    };
    let expected = std::path::Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string());
    // the kernel truncates comm to 15 bytes
    let expected: String = expected.chars().take(15).collect();
    if comm != expected {
        warn!(
            "pid {} is now '{}', not '{}'; treating the recording as gone",
            pid, comm, expected
        );
        return false;
    }
    true
}

/// Poll until `pid` is gone or `ceiling` passes. Returns true if it exited.
pub fn wait_for_pid_exit(pid: u32, ceiling: Duration, step: Duration) -> bool {
    let deadline = Instant::now() + ceiling;
    loop {
        if !pid_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(step);
    }
}

/// Wait up to `grace` for `child` to exit, killing it afterwards
pub fn wait_child_with_grace(child: &mut Child, grace: Duration) -> Result<ExitStatus> {
    let deadline = Instant::now() + grace;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            warn!("pid {} ignored end-of-stream for {:?}; killing", child.id(), grace);
            if let Err(e) = child.kill() {
                debug!("kill failed: {}", e);
            }
            return Ok(child.wait()?);
        }
        std::thread::sleep(POLL_STEP);
    }
}

/// Drain a child's stderr on a helper thread, keeping the tail
pub fn drain_stderr(stderr: Option<std::process::ChildStderr>) -> JoinHandle<String> {
    std::thread::spawn(move || match stderr {
        Some(stderr) => read_tail(stderr, STDERR_TAIL),
        None => String::new(),
    })
}

/// Read `reader` to the end, holding at most about `limit` bytes
fn read_tail(mut reader: impl Read, limit: usize) -> String {
    let mut chunk = [0u8; 8192];
    let mut tail: Vec<u8> = Vec::with_capacity(limit + chunk.len());
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > limit {
                    tail.drain(..tail.len() - limit);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                debug!("stderr drain stopped: {}", e);
                break;
            }
        }
    }
    String::from_utf8_lossy(&tail).trim().to_string()
}
