//! Typed portal results and option maps
//!
//! Response payloads are decoded into these structs at the transport
//! boundary so missing or mistyped fields surface as protocol errors instead
//! of propagating loosely typed maps.

use std::collections::HashMap;
use zbus::zvariant::{self, OwnedObjectPath, OwnedValue, Value};

use crate::config::{CursorMode, PersistMode};
use crate::error::{CapdropError, Result};
use crate::geometry::MonitorGeometry;

/// Source type bit for monitors
pub const SOURCE_TYPE_MONITOR: u32 = 1;

/// CreateSession results
#[derive(zvariant::DeserializeDict, zvariant::Type, Debug, Default)]
#[zvariant(signature = "a{sv}")]
pub struct CreateSessionResults {
    /// Session path; some backends send it as `s`, others as `o`
    #[zvariant(rename = "session_handle")]
    pub session_handle: Option<OwnedValue>,
}

impl CreateSessionResults {
    pub fn session_path(&self) -> Result<String> {
        let value = self
            .session_handle
            .as_ref()
            .ok_or_else(|| CapdropError::protocol("CreateSession returned no session_handle"))?;
        match &**value {
            Value::Str(s) => Ok(s.to_string()),
            Value::ObjectPath(p) => Ok(p.to_string()),
            other => Err(CapdropError::protocol(format!(
                "session_handle has unexpected type {}",
                other.value_signature()
            ))),
        }
    }
}

/// Screenshot results
#[derive(zvariant::DeserializeDict, zvariant::Type, Debug, Default)]
#[zvariant(signature = "a{sv}")]
pub struct ScreenshotResults {
    pub uri: Option<String>,
}

/// Per-stream properties from ScreenCast.Start
#[derive(zvariant::DeserializeDict, zvariant::Type, Debug, Default, Clone, PartialEq)]
#[zvariant(signature = "a{sv}")]
pub struct StreamProperties {
    pub id: Option<String>,
    pub position: Option<(i32, i32)>,
    pub size: Option<(i32, i32)>,
    #[zvariant(rename = "source_type")]
    pub source_type: Option<u32>,
    /// Only present when streams are keyed by object path
    #[zvariant(rename = "node_id")]
    pub node_id: Option<u32>,
}

/// ScreenCast.Start results with streams as `a(ua{sv})`
#[derive(zvariant::DeserializeDict, zvariant::Type, Debug, Default)]
#[zvariant(signature = "a{sv}")]
pub struct StartResults {
    pub streams: Option<Vec<(u32, StreamProperties)>>,
    #[zvariant(rename = "restore_token")]
    pub restore_token: Option<String>,
    /// Older backends name the token this way
    #[zvariant(rename = "persist_token")]
    pub persist_token: Option<String>,
}

/// ScreenCast.Start results with streams as `a(oa{sv})`
#[derive(zvariant::DeserializeDict, zvariant::Type, Debug, Default)]
#[zvariant(signature = "a{sv}")]
pub struct StartResultsByPath {
    pub streams: Option<Vec<(OwnedObjectPath, StreamProperties)>>,
    #[zvariant(rename = "restore_token")]
    pub restore_token: Option<String>,
    /// Older backends name the token this way
    #[zvariant(rename = "persist_token")]
    pub persist_token: Option<String>,
}

/// A stream as offered by the portal, before validation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OfferedStream {
    pub node_id: Option<u32>,
    pub object_path: Option<String>,
    pub properties: StreamProperties,
}

impl StartResults {
    /// Streams in offer order plus the new restore or persist token
    pub fn into_offered(self) -> (Vec<OfferedStream>, Option<String>) {
        let streams = self
            .streams
            .unwrap_or_default()
            .into_iter()
            .map(|(node_id, properties)| OfferedStream {
                node_id: Some(node_id),
                object_path: None,
                properties,
            })
            .collect();
        (streams, self.restore_token.or(self.persist_token))
    }
}

impl StartResultsByPath {
    /// Streams in offer order plus the new restore or persist token
    pub fn into_offered(self) -> (Vec<OfferedStream>, Option<String>) {
        let streams = self
            .streams
            .unwrap_or_default()
            .into_iter()
            .map(|(path, properties)| OfferedStream {
                node_id: properties.node_id,
                object_path: Some(path.to_string()),
                properties,
            })
            .collect();
        (streams, self.restore_token.or(self.persist_token))
    }
}

/// A validated stream; the node id is always present
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub node_id: u32,
    pub object_path: Option<String>,
    pub position: Option<(i32, i32)>,
    pub size: Option<(i32, i32)>,
    pub source_type: Option<u32>,
}

impl StreamDescriptor {
    /// Geometry of the captured monitor, missing parts from `fallback`
    pub fn monitor(&self, fallback: MonitorGeometry) -> MonitorGeometry {
        MonitorGeometry::from_stream(self.position, self.size, fallback)
    }
}

/// Pick the stream to capture: the first one, which must carry a node id
pub fn select_stream(streams: Vec<OfferedStream>) -> Result<StreamDescriptor> {
    let first = streams
        .into_iter()
        .next()
        .ok_or_else(|| CapdropError::protocol("ScreenCast.Start returned no streams"))?;
    let node_id = first
        .node_id
        .ok_or_else(|| CapdropError::protocol("ScreenCast.Start: first stream has no node id"))?;
    Ok(StreamDescriptor {
        node_id,
        object_path: first.object_path,
        position: first.properties.position,
        size: first.properties.size,
        source_type: first.properties.source_type,
    })
}

pub type OptionMap<'a> = HashMap<&'static str, Value<'a>>;

/// Screenshot options
pub fn screenshot_options(token: &str) -> OptionMap<'_> {
    HashMap::from([
        ("handle_token", Value::from(token)),
        ("interactive", Value::from(true)),
        ("modal", Value::from(true)),
    ])
}

/// CreateSession options
pub fn create_session_options<'a>(token: &'a str, session_token: &'a str) -> OptionMap<'a> {
    HashMap::from([
        ("handle_token", Value::from(token)),
        ("session_handle_token", Value::from(session_token)),
    ])
}

/// SelectSources options. A restore token is passed through verbatim.
pub fn select_sources_options<'a>(
    token: &'a str,
    multiple: bool,
    cursor_mode: CursorMode,
    persist_mode: PersistMode,
    restore_token: Option<&'a str>,
    audio: bool,
) -> OptionMap<'a> {
    let mut options = HashMap::from([
        ("handle_token", Value::from(token)),
        ("types", Value::from(SOURCE_TYPE_MONITOR)),
        ("multiple", Value::from(multiple)),
        ("cursor_mode", Value::from(cursor_mode.portal_value())),
        ("persist_mode", Value::from(persist_mode.portal_value())),
    ]);
    if let Some(restore) = restore_token.filter(|t| !t.is_empty()) {
        options.insert("restore_token", Value::from(restore));
    }
    if audio {
        options.insert("audio", Value::from(true));
    }
    options
}

/// Start options
pub fn start_options(token: &str) -> OptionMap<'_> {
    HashMap::from([("handle_token", Value::from(token))])
}
