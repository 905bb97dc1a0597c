//! Blocking W3C WebDriver client for an Appium server.

use super::{DeviceSession, RecordingOptions, SessionConnector};
use crate::capabilities::CapabilitySet;
use crate::config::SessionTimeouts;
use crate::result::{HandsetError, HandsetResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// HTTP timeout for a single command; session creation may install server APKs
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Opens Appium sessions over HTTP
#[derive(Debug, Clone)]
pub struct WebDriverConnector {
    client: Client,
}

impl WebDriverConnector {
    /// Create a connector with its own HTTP client
    pub fn new() -> HandsetResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HandsetError::SessionCreation {
                message: format!("HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl SessionConnector for WebDriverConnector {
    fn connect(
        &self,
        endpoint: &Url,
        capabilities: &CapabilitySet,
    ) -> HandsetResult<Box<dyn DeviceSession>> {
        let url = join(endpoint, "session")?;
        tracing::debug!(%url, platform = %capabilities.platform(), "creating session");

        let value = execute(
            "new_session",
            self.client.post(url).json(&capabilities.to_w3c_payload()),
        )
        .map_err(|e| HandsetError::SessionCreation {
            message: e.to_string(),
        })?;

        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| HandsetError::SessionCreation {
                message: "response did not contain a sessionId".to_string(),
            })?
            .to_string();
        let reported = value
            .get("capabilities")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let base = join(endpoint, &format!("session/{id}/"))?;
        tracing::info!(session = %id, "session created");
        Ok(Box::new(AppiumSession {
            client: self.client.clone(),
            base,
            id,
            capabilities: reported,
        }))
    }
}

/// A live Appium session
#[derive(Debug)]
pub struct AppiumSession {
    client: Client,
    base: Url,
    id: String,
    capabilities: Map<String, Value>,
}

impl AppiumSession {
    fn url(&self, path: &str) -> HandsetResult<Url> {
        self.base
            .join(path)
            .map_err(|e| HandsetError::webdriver(path, e.to_string()))
    }

    fn get(&self, command: &str, path: &str) -> HandsetResult<Value> {
        execute(command, self.client.get(self.url(path)?))
    }

    fn post(&self, command: &str, path: &str, body: &Value) -> HandsetResult<Value> {
        execute(command, self.client.post(self.url(path)?).json(body))
    }
}

impl DeviceSession for AppiumSession {
    fn session_id(&self) -> &str {
        &self.id
    }

    fn set_timeouts(&self, timeouts: &SessionTimeouts) -> HandsetResult<()> {
        let body = json!({
            "implicit": timeouts.implicit_wait.as_millis() as u64,
            "pageLoad": timeouts.page_load.as_millis() as u64,
            "script": timeouts.script.as_millis() as u64,
        });
        self.post("set_timeouts", "timeouts", &body).map(drop)
    }

    fn screenshot(&self) -> HandsetResult<Vec<u8>> {
        let value = self.get("screenshot", "screenshot")?;
        decode_base64("screenshot", &value).map_err(|e| HandsetError::Screenshot {
            message: e.to_string(),
        })
    }

    fn start_recording(&self, options: &RecordingOptions) -> HandsetResult<()> {
        let body = json!({ "options": options });
        self.post("start_recording_screen", "appium/start_recording_screen", &body)
            .map(drop)
            .map_err(|e| HandsetError::Recording {
                message: e.to_string(),
            })
    }

    fn stop_recording(&self) -> HandsetResult<Vec<u8>> {
        let value = self
            .post(
                "stop_recording_screen",
                "appium/stop_recording_screen",
                &json!({ "options": {} }),
            )
            .and_then(|v| decode_base64("stop_recording_screen", &v));
        value.map_err(|e| HandsetError::Recording {
            message: e.to_string(),
        })
    }

    fn terminate_app(&self, app_id: &str) -> HandsetResult<bool> {
        let value = self.post(
            "terminate_app",
            "appium/device/terminate_app",
            &json!({ "appId": app_id, "bundleId": app_id }),
        )?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn activate_app(&self, app_id: &str) -> HandsetResult<()> {
        self.post(
            "activate_app",
            "appium/device/activate_app",
            &json!({ "appId": app_id, "bundleId": app_id }),
        )
        .map(drop)
    }

    fn background_app(&self, seconds: i64) -> HandsetResult<()> {
        self.post(
            "background_app",
            "appium/app/background",
            &json!({ "seconds": seconds }),
        )
        .map(drop)
    }

    fn capability(&self, name: &str) -> Option<Value> {
        self.capabilities
            .get(name)
            .or_else(|| self.capabilities.get(&format!("appium:{name}")))
            .cloned()
    }

    fn quit(&self) -> HandsetResult<()> {
        // DELETE /session/{id} takes no trailing slash
        let mut url = self.base.clone();
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(&path);
        execute("delete_session", self.client.delete(url)).map(drop)
    }
}

/// Query `GET /status` on an Appium server
pub fn server_status(endpoint: &Url) -> HandsetResult<Value> {
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| HandsetError::webdriver("status", e.to_string()))?;
    execute("status", client.get(join(endpoint, "status")?))
}

/// Join `path` onto `base`, treating `base` as a directory
fn join(base: &Url, path: &str) -> HandsetResult<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path).map_err(|e| HandsetError::InvalidEndpoint {
        endpoint: base.to_string(),
        message: e.to_string(),
    })
}

/// Send a request and unwrap the W3C `{"value": ...}` envelope
fn execute(command: &str, request: RequestBuilder) -> HandsetResult<Value> {
    let response = request
        .send()
        .map_err(|e| HandsetError::webdriver(command, e.to_string()))?;
    let status = response.status();
    let text = response
        .text()
        .map_err(|e| HandsetError::webdriver(command, e.to_string()))?;
    unwrap_envelope(command, status.is_success(), status.as_u16(), &text)
}

fn unwrap_envelope(command: &str, success: bool, status: u16, text: &str) -> HandsetResult<Value> {
    let body: Value = if text.trim().is_empty() {
        json!({ "value": null })
    } else {
        serde_json::from_str(text).map_err(|_| {
            HandsetError::webdriver(command, format!("HTTP {status}: non-JSON response body"))
        })?
    };
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(HandsetError::webdriver(command, format!("{error}: {message}")));
    }
    if !success {
        return Err(HandsetError::webdriver(command, format!("HTTP {status}")));
    }
    Ok(value)
}

fn decode_base64(command: &str, value: &Value) -> HandsetResult<Vec<u8>> {
    let encoded = value
        .as_str()
        .ok_or_else(|| HandsetError::webdriver(command, "expected a base64 string"))?;
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| HandsetError::webdriver(command, format!("invalid base64: {e}")))
}
