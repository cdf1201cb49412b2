//! xdg-desktop-portal client
//!
//! Talks to the Screenshot and ScreenCast portals over the session bus:
//! - one-shot interactive screenshots
//! - screencast sessions yielding a PipeWire node and remote descriptor

mod request;
mod results;
mod screencast;
mod screenshot;
mod transport;

pub use request::{Correlator, PendingRequest};
pub use results::{
    create_session_options, select_sources_options, select_stream, start_options, CreateSessionResults,
    OfferedStream, ScreenshotResults, StartResults, StartResultsByPath, StreamDescriptor, StreamProperties,
};
pub use screencast::{
    decode_streams, PortalScreencast, PortalSession, ScreencastClient, ScreencastGrant, ScreencastOptions, ScreencastProvider,
    SessionStep, SCREENCAST_IFACE,
};
pub use screenshot::{
    copy_when_ready, reencode_jpeg, request_screenshot, take_screenshot, uri_to_path, ScreenshotOptions,
    SCREENSHOT_IFACE,
};
pub use transport::{
    is_invalid_args, new_session_token, new_token, request_path_for, BusTransport, PortalResponse, PORTAL_DEST,
    PORTAL_PATH, REQUEST_IFACE,
};
