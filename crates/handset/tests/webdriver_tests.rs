//! WebDriver client tests against a local stub Appium server.
//!
//! The stub records every request it receives and answers the way Appium
//! does, so each test can check the exact verb, path and JSON body the
//! client sent.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use handset::config::SessionTimeouts;
use handset::session::RecordingOptions;
use handset::*;
use serde_json::{json, Value};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
struct Request {
    method: String,
    path: String,
    body: Value,
}

#[derive(Clone, Default)]
struct Stub {
    requests: Arc<Mutex<Vec<Request>>>,
    deleted: Arc<Mutex<bool>>,
}

impl Stub {
    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn last(&self) -> Request {
        self.requests().pop().expect("no request recorded")
    }
}

async fn appium(State(stub): State<Stub>, method: Method, uri: Uri, body: Bytes) -> impl IntoResponse {
    let path = uri.path().to_string();
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    stub.requests.lock().unwrap().push(Request {
        method: method.to_string(),
        path: path.clone(),
        body,
    });

    if *stub.deleted.lock().unwrap() && path.starts_with("/wd/hub/session/") {
        let error = json!({"value": {"error": "invalid session id", "message": "session deleted"}});
        return (StatusCode::NOT_FOUND, Json(error));
    }

    let value = match (method.as_str(), path.as_str()) {
        ("GET", "/wd/hub/status") => json!({"ready": true, "build": {"version": "2.11.0"}}),
        ("POST", "/wd/hub/session") => json!({
            "sessionId": "s-42",
            "capabilities": {"platformName": "Android", "appium:deviceName": "Pixel 7"}
        }),
        ("GET", "/wd/hub/session/s-42/screenshot") => json!(STANDARD.encode(b"png-bytes")),
        ("POST", "/wd/hub/session/s-42/appium/stop_recording_screen") => {
            json!(STANDARD.encode(b"mp4-bytes"))
        }
        ("POST", "/wd/hub/session/s-42/appium/device/terminate_app") => json!(true),
        ("DELETE", "/wd/hub/session/s-42") => {
            *stub.deleted.lock().unwrap() = true;
            Value::Null
        }
        ("POST", _) if path.starts_with("/wd/hub/session/s-42/") => Value::Null,
        _ => {
            let error = json!({"value": {"error": "unknown command", "message": path}});
            return (StatusCode::NOT_FOUND, Json(error));
        }
    };
    (StatusCode::OK, Json(json!({ "value": value })))
}

/// Serve the stub on an ephemeral port from its own runtime thread
fn start_stub() -> (Stub, reqwest::Url) {
    let stub = Stub::default();
    let app = Router::new().fallback(appium).with_state(stub.clone());
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    let addr = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    let endpoint = parse_endpoint(&format!("http://{addr}/wd/hub")).unwrap();
    (stub, endpoint)
}

fn capabilities() -> CapabilitySet {
    let settings = Settings::from_pairs([
        ("android.app.path", "/nonexistent/app.apk"),
        ("android.app.package", "com.example.shop"),
    ])
    .unwrap();
    CapabilitySet::for_platform(&settings, Platform::Android).unwrap()
}

fn connect() -> (Stub, Box<dyn DeviceSession>) {
    let (stub, endpoint) = start_stub();
    let session = WebDriverConnector::new()
        .unwrap()
        .connect(&endpoint, &capabilities())
        .unwrap();
    (stub, session)
}

// ============================================================================
// Session creation
// ============================================================================

#[test]
fn test_connect_posts_w3c_payload_and_reads_session() {
    let (stub, session) = connect();

    let create = &stub.requests()[0];
    assert_eq!(create.method, "POST");
    assert_eq!(create.path, "/wd/hub/session");
    let always = &create.body["capabilities"]["alwaysMatch"];
    assert_eq!(always["platformName"], "Android");
    assert_eq!(always["appium:appPackage"], "com.example.shop");
    assert_eq!(create.body["capabilities"]["firstMatch"], json!([{}]));

    assert_eq!(session.session_id(), "s-42");
    assert_eq!(session.capability("deviceName"), Some(json!("Pixel 7")));
    assert_eq!(session.capability("platformName"), Some(json!("Android")));
    assert_eq!(session.capability("udid"), None);
}

#[test]
fn test_connect_failure_is_session_creation_error() {
    let (_stub, endpoint) = start_stub();
    let elsewhere = endpoint.join("/nowhere").unwrap();
    let err = WebDriverConnector::new()
        .unwrap()
        .connect(&elsewhere, &capabilities())
        .unwrap_err();
    assert!(matches!(err, HandsetError::SessionCreation { .. }), "{err}");
    assert!(err.to_string().contains("unknown command"));
}

// ============================================================================
// Session commands
// ============================================================================

#[test]
fn test_set_timeouts_sends_milliseconds() {
    let (stub, session) = connect();
    let timeouts = SessionTimeouts {
        implicit_wait: Duration::from_secs(10),
        page_load: Duration::from_secs(30),
        script: Duration::from_millis(1500),
    };
    session.set_timeouts(&timeouts).unwrap();

    let request = stub.last();
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/wd/hub/session/s-42/timeouts");
    assert_eq!(
        request.body,
        json!({"implicit": 10_000, "pageLoad": 30_000, "script": 1_500})
    );
}

#[test]
fn test_screenshot_is_decoded() {
    let (stub, session) = connect();
    assert_eq!(session.screenshot().unwrap(), b"png-bytes");

    let request = stub.last();
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/wd/hub/session/s-42/screenshot");
}

#[test]
fn test_recording_start_and_stop() {
    let (stub, session) = connect();
    let options = RecordingOptions {
        time_limit: 1800,
        bit_rate: Some(4_000_000),
        video_type: None,
        video_quality: None,
        force_restart: true,
    };
    session.start_recording(&options).unwrap();

    let start = stub.last();
    assert_eq!(start.method, "POST");
    assert_eq!(start.path, "/wd/hub/session/s-42/appium/start_recording_screen");
    assert_eq!(
        start.body,
        json!({"options": {"timeLimit": 1800, "bitRate": 4_000_000, "forceRestart": true}})
    );

    assert_eq!(session.stop_recording().unwrap(), b"mp4-bytes");
    let stop = stub.last();
    assert_eq!(stop.path, "/wd/hub/session/s-42/appium/stop_recording_screen");
    assert_eq!(stop.body, json!({"options": {}}));
}

#[test]
fn test_app_lifecycle_commands() {
    let (stub, session) = connect();

    assert!(session.terminate_app("com.example.shop").unwrap());
    let terminate = stub.last();
    assert_eq!(terminate.path, "/wd/hub/session/s-42/appium/device/terminate_app");
    assert_eq!(
        terminate.body,
        json!({"appId": "com.example.shop", "bundleId": "com.example.shop"})
    );

    session.activate_app("com.example.shop").unwrap();
    let activate = stub.last();
    assert_eq!(activate.method, "POST");
    assert_eq!(activate.path, "/wd/hub/session/s-42/appium/device/activate_app");
    assert_eq!(activate.body["appId"], "com.example.shop");

    session.background_app(-1).unwrap();
    let background = stub.last();
    assert_eq!(background.path, "/wd/hub/session/s-42/appium/app/background");
    assert_eq!(background.body, json!({"seconds": -1}));
}

#[test]
fn test_quit_deletes_session_and_later_commands_fail() {
    let (stub, session) = connect();
    session.quit().unwrap();

    let delete = stub.last();
    assert_eq!(delete.method, "DELETE");
    assert_eq!(delete.path, "/wd/hub/session/s-42");

    let err = session.screenshot().unwrap_err();
    assert!(matches!(err, HandsetError::Screenshot { .. }), "{err}");
    assert!(err.to_string().contains("invalid session id"));
}

// ============================================================================
// Server status
// ============================================================================

#[test]
fn test_server_status() {
    let (stub, endpoint) = start_stub();
    let status = server_status(&endpoint).unwrap();
    assert_eq!(status["ready"], true);
    assert_eq!(status["build"]["version"], "2.11.0");
    assert_eq!(stub.last().path, "/wd/hub/status");
}
