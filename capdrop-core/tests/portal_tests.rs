//! Integration tests for portal request correlation and result decoding

use capdrop_core::portal::{
    decode_streams, select_stream, Correlator, PortalResponse, ScreenshotResults,
};
use capdrop_core::CapdropError;
use std::collections::HashMap;
use std::time::Duration;
use zbus::zvariant::{ObjectPath, Value};

const HANDLE: &str = "/org/freedesktop/portal/desktop/request/1_42/capdrop_0a1b2c3d";

fn response_message(code: u32, results: HashMap<&str, Value<'_>>) -> zbus::Message {
    zbus::Message::signal(HANDLE, "org.freedesktop.portal.Request", "Response")
        .expect("valid signal header")
        .build(&(code, results))
        .expect("serializable body")
}

fn stream_props<'a>(entries: Vec<(&'a str, Value<'a>)>) -> HashMap<&'a str, Value<'a>> {
    entries.into_iter().collect()
}

#[tokio::test]
async fn test_response_reaches_waiter() {
    let correlator = Correlator::new();
    let pending = correlator.register(HANDLE, Duration::from_secs(5)).unwrap();
    assert_eq!(pending.handle(), HANDLE);
    assert_eq!(correlator.pending_count(), 1);

    let mut results = HashMap::new();
    results.insert("uri", Value::from("file:///tmp/Screenshot.png"));
    assert!(correlator.complete(HANDLE, response_message(0, results)));

    let message = pending.wait().await.unwrap();
    let response = PortalResponse::new("Screenshot", message);
    assert_eq!(response.code().unwrap(), 0);
    let results: ScreenshotResults = response.results().unwrap();
    assert_eq!(results.uri.as_deref(), Some("file:///tmp/Screenshot.png"));
    assert_eq!(correlator.pending_count(), 0);
}

#[tokio::test]
async fn test_wait_times_out() {
    let correlator = Correlator::new();
    let pending = correlator.register(HANDLE, Duration::from_millis(50)).unwrap();

    let err = pending.wait().await.unwrap_err();
    assert!(matches!(err, CapdropError::Timeout { ref what, .. } if what == HANDLE));
    assert_eq!(correlator.pending_count(), 0);

    // A late signal finds nobody
    assert!(!correlator.complete(HANDLE, response_message(0, HashMap::new())));
}

#[test]
fn test_duplicate_handle_rejected_until_dropped() {
    tokio_test::block_on(async {
        let correlator = Correlator::new();
        let first = correlator.register(HANDLE, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            correlator.register(HANDLE, Duration::from_secs(5)),
            Err(CapdropError::Protocol(_))
        ));

        drop(first);
        assert_eq!(correlator.pending_count(), 0);
        assert!(correlator.register(HANDLE, Duration::from_secs(5)).is_ok());
    });
}

#[test]
fn test_unknown_handle_is_ignored() {
    let correlator = Correlator::new();
    let _other = correlator
        .register("/org/freedesktop/portal/desktop/request/1_42/other", Duration::from_secs(5))
        .unwrap();
    assert!(!correlator.complete(HANDLE, response_message(0, HashMap::new())));
    assert_eq!(correlator.pending_count(), 1);
}

#[test]
fn test_nonzero_status_is_cancelled_or_denied() {
    let response = PortalResponse::new("SelectSources", response_message(1, HashMap::new()));
    match response.check().unwrap_err() {
        CapdropError::CancelledOrDenied { request, code } => {
            assert_eq!(request, "SelectSources");
            assert_eq!(code, 1);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(response.results::<ScreenshotResults>().is_err());
}

#[test]
fn test_streams_keyed_by_node_id() {
    let streams = vec![
        (
            61u32,
            stream_props(vec![
                ("position", Value::from((1920i32, 0i32))),
                ("size", Value::from((2560i32, 1440i32))),
                ("source_type", Value::from(1u32)),
            ]),
        ),
        (62u32, stream_props(vec![])),
    ];
    let mut results = HashMap::new();
    results.insert("streams", Value::from(streams));
    results.insert("restore_token", Value::from("tok-123"));

    let response = PortalResponse::new("Start", response_message(0, results));
    let (offered, token) = decode_streams(&response).unwrap();
    assert_eq!(offered.len(), 2);
    assert_eq!(token.as_deref(), Some("tok-123"));

    let stream = select_stream(offered).unwrap();
    assert_eq!(stream.node_id, 61);
    assert_eq!(stream.position, Some((1920, 0)));
    assert_eq!(stream.size, Some((2560, 1440)));
}

#[test]
fn test_persist_token_is_accepted() {
    let streams = vec![(61u32, stream_props(vec![]))];
    let mut results = HashMap::new();
    results.insert("streams", Value::from(streams));
    results.insert("persist_token", Value::from("persisted-1"));

    let response = PortalResponse::new("Start", response_message(0, results));
    let (_, token) = decode_streams(&response).unwrap();
    assert_eq!(token.as_deref(), Some("persisted-1"));
}

#[test]
fn test_streams_keyed_by_object_path() {
    let path = ObjectPath::try_from("/org/freedesktop/portal/desktop/stream/1").unwrap();
    let streams = vec![(path, stream_props(vec![("node_id", Value::from(77u32))]))];
    let mut results = HashMap::new();
    results.insert("streams", Value::from(streams));

    let response = PortalResponse::new("Start", response_message(0, results));
    let (offered, token) = decode_streams(&response).unwrap();
    assert!(token.is_none());

    let stream = select_stream(offered).unwrap();
    assert_eq!(stream.node_id, 77);
    assert_eq!(
        stream.object_path.as_deref(),
        Some("/org/freedesktop/portal/desktop/stream/1")
    );
}

#[test]
fn test_start_without_streams_is_a_protocol_error() {
    let response = PortalResponse::new("Start", response_message(0, HashMap::new()));
    let (offered, _) = decode_streams(&response).unwrap();
    assert!(matches!(select_stream(offered), Err(CapdropError::Protocol(_))));
}
