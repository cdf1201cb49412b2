//! ScreenCast portal session negotiation
//!
//! CreateSession, SelectSources, Start and OpenPipeWireRemote run strictly in
//! order on one bus connection. The connection must stay open for as long as
//! the stream is consumed, so the resulting [`ScreencastGrant`] owns it.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};
use zbus::zvariant::{ObjectPath, Value};

use super::results::{
    create_session_options, select_sources_options, select_stream, start_options, CreateSessionResults,
    OfferedStream, StartResults, StartResultsByPath, StreamDescriptor,
};
use super::transport::{new_session_token, new_token, BusTransport, PortalResponse};
use crate::config::{CursorMode, PersistMode};
use crate::error::{CapdropError, Result};
use crate::process::RemoteHandle;
use crate::types::ScreenType;

pub const SCREENCAST_IFACE: &str = "org.freedesktop.portal.ScreenCast";

/// Options for one screencast negotiation
#[derive(Debug, Clone)]
pub struct ScreencastOptions {
    /// Allow selecting several monitors
    pub multiple: bool,
    pub cursor_mode: CursorMode,
    pub persist_mode: PersistMode,
    /// Ask for audio alongside video
    pub audio: bool,
    /// Deadline for each Response signal
    pub timeout: Duration,
    /// Deadline for OpenPipeWireRemote
    pub remote_timeout: Duration,
}

impl Default for ScreencastOptions {
    fn default() -> Self {
        Self {
            multiple: true,
            cursor_mode: CursorMode::Embedded,
            persist_mode: PersistMode::Persistent,
            audio: true,
            timeout: Duration::from_secs(60),
            remote_timeout: Duration::from_secs(10),
        }
    }
}

/// Progress of a screencast negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    Idle,
    Created,
    SourcesSelected,
    Started,
    RemoteOpened,
}

impl std::fmt::Display for SessionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Created => "session created",
            Self::SourcesSelected => "sources selected",
            Self::Started => "started",
            Self::RemoteOpened => "remote opened",
        };
        f.write_str(name)
    }
}

/// An established portal session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalSession {
    pub path: String,
    pub screen_type: ScreenType,
    /// Token to skip the selection dialog next time
    pub restore_token: Option<String>,
}

/// Everything a capture needs from a granted screencast
#[derive(Debug)]
pub struct ScreencastGrant {
    pub session: PortalSession,
    pub stream: StreamDescriptor,
    pub remote: RemoteHandle,
    transport: Option<BusTransport>,
}

impl ScreencastGrant {
    pub fn new(session: PortalSession, stream: StreamDescriptor, remote: RemoteHandle) -> Self {
        Self {
            session,
            stream,
            remote,
            transport: None,
        }
    }

    /// Keep `transport` (and with it the portal session) alive with the grant
    pub fn keep_alive(mut self, transport: BusTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Close the portal session. Best-effort.
    pub async fn close(self) {
        if let Some(transport) = &self.transport {
            transport.close_session(&self.session.path).await;
        }
    }
}

/// Source of screencast grants
pub trait ScreencastProvider {
    /// Negotiate a session, reusing `restore_token` when given
    fn acquire(&self, restore_token: Option<String>) -> impl Future<Output = Result<ScreencastGrant>>;
}

/// [`ScreencastProvider`] talking to xdg-desktop-portal; every acquisition
/// opens its own bus connection
#[derive(Debug, Clone, Default)]
pub struct PortalScreencast {
    pub options: ScreencastOptions,
}

impl PortalScreencast {
    pub fn new(options: ScreencastOptions) -> Self {
        Self { options }
    }
}

impl ScreencastProvider for PortalScreencast {
    async fn acquire(&self, restore_token: Option<String>) -> Result<ScreencastGrant> {
        let transport = BusTransport::connect(self.options.timeout).await?;
        let mut client = ScreencastClient::new(transport.clone(), self.options.clone());
        let grant = client.negotiate(restore_token.as_deref()).await?;
        Ok(grant.keep_alive(transport))
    }
}

/// Drives one screencast negotiation step by step
pub struct ScreencastClient {
    transport: BusTransport,
    options: ScreencastOptions,
    step: SessionStep,
}

impl ScreencastClient {
    pub fn new(transport: BusTransport, options: ScreencastOptions) -> Self {
        Self {
            transport,
            options,
            step: SessionStep::Idle,
        }
    }

    pub fn step(&self) -> SessionStep {
        self.step
    }

    fn at_step(&self, err: CapdropError) -> CapdropError {
        err.with_context(format!("ScreenCast failed after step '{}'", self.step))
    }

    /// Run all four steps. On failure after the session exists, the session
    /// is closed before the error is returned.
    pub async fn negotiate(&mut self, restore_token: Option<&str>) -> Result<ScreencastGrant> {
        let session = self.create_session().await.map_err(|e| self.at_step(e))?;

        match self.establish(&session, restore_token).await {
            Ok((stream, restored, remote)) => {
                info!("Screencast ready: node {} via {}", stream.node_id, session);
                Ok(ScreencastGrant::new(
                    PortalSession {
                        path: session,
                        screen_type: ScreenType::ScreenCast,
                        restore_token: restored,
                    },
                    stream,
                    remote,
                ))
            }
            Err(e) => {
                let err = self.at_step(e);
                self.transport.close_session(&session).await;
                Err(err)
            }
        }
    }

    async fn establish(
        &mut self,
        session: &str,
        restore_token: Option<&str>,
    ) -> Result<(StreamDescriptor, Option<String>, RemoteHandle)> {
        self.select_sources(session, restore_token).await?;
        let (stream, restored) = self.start(session).await?;
        let remote = self.open_remote(session).await?;
        Ok((stream, restored, remote))
    }

    /// CreateSession; returns the session path
    pub async fn create_session(&mut self) -> Result<String> {
        let token = new_token();
        let session_token = new_session_token();
        let response = self
            .transport
            .request(
                SCREENCAST_IFACE,
                "CreateSession",
                &(create_session_options(&token, &session_token),),
                &token,
            )
            .await?;
        let session = response.results::<CreateSessionResults>()?.session_path()?;
        debug!("screencast session {}", session);
        self.step = SessionStep::Created;
        Ok(session)
    }

    pub async fn select_sources(&mut self, session: &str, restore_token: Option<&str>) -> Result<()> {
        let token = new_token();
        let options = select_sources_options(
            &token,
            self.options.multiple,
            self.options.cursor_mode,
            self.options.persist_mode,
            restore_token,
            self.options.audio,
        );
        if restore_token.is_some() {
            debug!("reusing saved restore token");
        }
        self.transport
            .request(SCREENCAST_IFACE, "SelectSources", &(session_path(session)?, options), &token)
            .await?
            .check()?;
        self.step = SessionStep::SourcesSelected;
        Ok(())
    }

    /// Start; returns the stream to capture and any new restore token
    pub async fn start(&mut self, session: &str) -> Result<(StreamDescriptor, Option<String>)> {
        let token = new_token();
        let response = self
            .transport
            .request(
                SCREENCAST_IFACE,
                "Start",
                &(session_path(session)?, "", start_options(&token)),
                &token,
            )
            .await?;

        let (streams, restored) = decode_streams(&response)?;
        debug!("portal offered {} stream(s)", streams.len());

        let stream = select_stream(streams)?;
        self.step = SessionStep::Started;
        Ok((stream, restored))
    }

    pub async fn open_remote(&mut self, session: &str) -> Result<RemoteHandle> {
        let options: HashMap<&str, Value<'_>> = HashMap::new();
        let fd = self
            .transport
            .call_fd(
                SCREENCAST_IFACE,
                "OpenPipeWireRemote",
                &(session_path(session)?, options),
                self.options.remote_timeout,
            )
            .await?;
        let remote = RemoteHandle::new(fd);
        debug!("PipeWire remote fd {}", remote.raw());
        self.step = SessionStep::RemoteOpened;
        Ok(remote)
    }
}

/// Decode Start results whose streams are keyed either by node id or by
/// object path
pub fn decode_streams(response: &PortalResponse) -> Result<(Vec<OfferedStream>, Option<String>)> {
    response.check()?;
    match response.results::<StartResults>() {
        Ok(results) => Ok(results.into_offered()),
        Err(e) => {
            debug!("streams are not a(ua{{sv}}) ({}); trying a(oa{{sv}})", e);
            Ok(response.results::<StartResultsByPath>()?.into_offered())
        }
    }
}

fn session_path(session: &str) -> Result<ObjectPath<'_>> {
    ObjectPath::try_from(session)
        .map_err(|e| CapdropError::protocol(format!("Invalid session path '{}': {}", session, e)))
}
