//! Correlates portal `Response` signals with the calls that caused them
//!
//! Every portal method returns a Request object path immediately and delivers
//! its real result later as a `Response` signal on that path. The
//! [`Correlator`] keeps one completion slot per live path; a
//! [`PendingRequest`] owns that slot and whatever task feeds it, and
//! releases both when it resolves, times out or is dropped.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{CapdropError, Result};

type Registry = Arc<Mutex<HashMap<String, oneshot::Sender<zbus::Message>>>>;

/// Registry of in-flight requests keyed by handle path
#[derive(Debug, Clone, Default)]
pub struct Correlator {
    pending: Registry,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start waiting for the Response on `handle`.
    ///
    /// At most one request may be pending per handle.
    pub fn register(&self, handle: &str, timeout: Duration) -> Result<PendingRequest> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if pending.contains_key(handle) {
                return Err(CapdropError::protocol(format!(
                    "A request is already pending on {}",
                    handle
                )));
            }
            pending.insert(handle.to_string(), tx);
        }
        trace!("registered {}", handle);

        Ok(PendingRequest {
            handle: handle.to_string(),
            deadline: Instant::now() + timeout,
            timeout,
            rx,
            registry: Arc::clone(&self.pending),
            forwarder: None,
        })
    }

    /// Deliver `message` to the request waiting on `handle`.
    ///
    /// Returns false if nothing was waiting; a late or duplicate signal is
    /// dropped.
    pub fn complete(&self, handle: &str, message: zbus::Message) -> bool {
        let sender = self.pending.lock().remove(handle);
        match sender {
            Some(tx) => tx.send(message).is_ok(),
            None => {
                debug!("dropping Response for {} with no pending request", handle);
                false
            }
        }
    }

    /// Number of requests still waiting
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// One outstanding portal request
#[derive(Debug)]
pub struct PendingRequest {
    handle: String,
    deadline: Instant,
    timeout: Duration,
    rx: oneshot::Receiver<zbus::Message>,
    registry: Registry,
    forwarder: Option<JoinHandle<()>>,
}

impl PendingRequest {
    /// Request handle path
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Tie the signal-forwarding task to this request's lifetime
    pub fn attach(&mut self, forwarder: JoinHandle<()>) {
        if let Some(old) = self.forwarder.replace(forwarder) {
            old.abort();
        }
    }

    /// Wait for the Response message or the deadline
    pub async fn wait(mut self) -> Result<zbus::Message> {
        match tokio::time::timeout_at(self.deadline, &mut self.rx).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(CapdropError::protocol(format!(
                "Request {} was abandoned before its Response",
                self.handle
            ))),
            Err(_) => Err(CapdropError::timeout(self.handle.clone(), self.timeout)),
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        // the slot under our handle can only be ours while we are alive
        self.registry.lock().remove(&self.handle);
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}
