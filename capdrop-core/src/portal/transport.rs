//! Session-bus transport for portal calls
//!
//! Issues portal method calls and turns the asynchronous Request/Response
//! pattern into a single awaited result.

use futures::StreamExt;
use std::collections::HashMap;
use std::os::fd::OwnedFd;
use std::time::Duration;
use tracing::{debug, trace, warn};
use zbus::zvariant::{self, DynamicType, OwnedObjectPath, OwnedValue};
use zbus::{Connection, MatchRule, MessageStream};

use super::request::{Correlator, PendingRequest};
use crate::error::{CapdropError, Result};

/// Portal service name
pub const PORTAL_DEST: &str = "org.freedesktop.portal.Desktop";
/// Portal object path
pub const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
/// Interface carrying the Response signal
pub const REQUEST_IFACE: &str = "org.freedesktop.portal.Request";
/// Interface of portal session objects
pub const SESSION_IFACE: &str = "org.freedesktop.portal.Session";
/// Error name a portal uses for a signature it does not accept
pub const INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";

/// Fresh request token, unique per call
pub fn new_token() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("capdrop_{}", &id[..8])
}

/// Fresh session token
pub fn new_session_token() -> String {
    format!("{}_sess", new_token())
}

/// Whether `err` is the bus rejecting a call's argument signature
pub fn is_invalid_args(err: &CapdropError) -> bool {
    matches!(err.root(), CapdropError::Bus(msg) if msg.contains(INVALID_ARGS))
}

/// Connection to the session bus plus the request registry
#[derive(Debug, Clone)]
pub struct BusTransport {
    connection: Connection,
    correlator: Correlator,
    timeout: Duration,
}

impl BusTransport {
    /// Connect to the session bus; `timeout` bounds every portal call
    pub async fn connect(timeout: Duration) -> Result<Self> {
        let connection = Connection::session().await?;
        debug!(
            "Connected to session bus as {:?}",
            connection.unique_name().map(|n| n.as_str())
        );
        Ok(Self::with_connection(connection, timeout))
    }

    pub fn with_connection(connection: Connection, timeout: Duration) -> Self {
        Self {
            connection,
            correlator: Correlator::new(),
            timeout,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Request object path the portal will use for `token`
    pub fn request_path(&self, token: &str) -> Result<String> {
        let unique = self
            .connection
            .unique_name()
            .ok_or_else(|| CapdropError::Bus("Connection has no unique name".into()))?;
        Ok(request_path_for(unique.as_str(), token))
    }

    /// Subscribe to the Response signal on `handle`. The match rule lives
    /// exactly as long as the returned request.
    async fn subscribe(&self, handle: &str) -> Result<PendingRequest> {
        let mut pending = self.correlator.register(handle, self.timeout)?;

        let rule = MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .sender(PORTAL_DEST)?
            .interface(REQUEST_IFACE)?
            .member("Response")?
            .path(handle.to_string())?
            .build();
        let mut stream = MessageStream::for_match_rule(rule, &self.connection, Some(1)).await?;
        trace!("subscribed to Response on {}", handle);

        let correlator = self.correlator.clone();
        let key = handle.to_string();
        pending.attach(tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(message) => {
                        correlator.complete(&key, message);
                        break;
                    }
                    Err(e) => debug!("Response stream error on {}: {}", key, e),
                }
            }
        }));

        Ok(pending)
    }

    async fn call<B>(&self, path: &str, interface: &str, method: &str, body: &B, timeout: Duration) -> Result<zbus::Message>
    where
        B: serde::Serialize + DynamicType,
    {
        tokio::time::timeout(
            timeout,
            self.connection
                .call_method(Some(PORTAL_DEST), path, Some(interface), method, body),
        )
        .await
        .map_err(|_| CapdropError::timeout(format!("{}.{}", interface, method), timeout))?
        .map_err(|e| CapdropError::from(e).with_context(format!("{} failed", method)))
    }

    /// Call a portal method that answers through a Request object and wait
    /// for its Response.
    ///
    /// `token` must be the `handle_token` carried in `body`'s options.
    pub async fn request<B>(&self, interface: &str, method: &str, body: &B, token: &str) -> Result<PortalResponse>
    where
        B: serde::Serialize + DynamicType,
    {
        let expected = self.request_path(token)?;
        let mut pending = self.subscribe(&expected).await?;

        debug!("calling {}.{}", interface, method);
        let reply = self.call(PORTAL_PATH, interface, method, body, self.timeout).await?;
        let handle: OwnedObjectPath = reply.body().deserialize()?;

        if handle.as_str() != expected {
            // pre-0.9 portals pick their own path
            debug!("portal chose {} instead of {}", handle.as_str(), expected);
            drop(pending);
            pending = self.subscribe(handle.as_str()).await?;
        }

        let message = pending.wait().await?;
        Ok(PortalResponse::new(method, message))
    }

    /// Call a method whose reply carries a file descriptor
    pub async fn call_fd<B>(&self, interface: &str, method: &str, body: &B, timeout: Duration) -> Result<OwnedFd>
    where
        B: serde::Serialize + DynamicType,
    {
        let reply = self.call(PORTAL_PATH, interface, method, body, timeout).await?;
        let fd: zvariant::OwnedFd = reply
            .body()
            .deserialize()
            .map_err(|e| CapdropError::protocol(format!("{} returned no descriptor: {}", method, e)))?;
        Ok(fd.into())
    }

    /// Close a portal session. Best-effort.
    pub async fn close_session(&self, session: &str) {
        match self
            .call(session, SESSION_IFACE, "Close", &(), self.timeout)
            .await
        {
            Ok(_) => debug!("Closed portal session {}", session),
            Err(e) => warn!("Failed to close portal session {}: {}", session, e),
        }
    }
}

/// `/org/freedesktop/portal/desktop/request/<sender>/<token>`
pub fn request_path_for(unique_name: &str, token: &str) -> String {
    let sender = unique_name.trim_start_matches(':').replace('.', "_");
    format!("{}/request/{}/{}", PORTAL_PATH, sender, token)
}

/// Response signal payload of one request
#[derive(Debug, Clone)]
pub struct PortalResponse {
    method: String,
    message: zbus::Message,
}

impl PortalResponse {
    pub fn new(method: impl Into<String>, message: zbus::Message) -> Self {
        Self {
            method: method.into(),
            message,
        }
    }

    /// Response status; 0 is success
    pub fn code(&self) -> Result<u32> {
        let body = self.message.body();
        let (code, _): (u32, HashMap<String, OwnedValue>) = body.deserialize()?;
        Ok(code)
    }

    /// Fail unless the portal reported success
    pub fn check(&self) -> Result<()> {
        match self.code()? {
            0 => Ok(()),
            code => Err(CapdropError::CancelledOrDenied {
                request: self.method.clone(),
                code,
            }),
        }
    }

    /// Decode the results map of a successful response
    pub fn results<T>(&self) -> Result<T>
    where
        T: zvariant::Type + serde::de::DeserializeOwned,
    {
        self.check()?;
        let body = self.message.body();
        let (_, results): (u32, T) = body.deserialize().map_err(|e| {
            CapdropError::protocol(format!("Unexpected {} results: {}", self.method, e))
        })?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path_for() {
        assert_eq!(
            request_path_for(":1.234", "capdrop_0a1b2c3d"),
            "/org/freedesktop/portal/desktop/request/1_234/capdrop_0a1b2c3d"
        );
    }

    #[test]
    fn test_tokens() {
        let token = new_token();
        assert!(token.starts_with("capdrop_"));
        assert_eq!(token.len(), "capdrop_".len() + 8);
        assert_ne!(token, new_token());
        assert!(new_session_token().ends_with("_sess"));
    }

    #[test]
    fn test_invalid_args_detection() {
        let err = CapdropError::Bus(format!("{}: bad signature", INVALID_ARGS))
            .with_context("Screenshot failed");
        assert!(is_invalid_args(&err));
        assert!(!is_invalid_args(&CapdropError::Bus("NoReply".into())));
    }
}
