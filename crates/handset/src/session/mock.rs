//! In-memory device for tests and dry runs.
//!
//! A [`MockDevice`] is shared between the connector and every session it
//! opens, so a test can inject failures and inspect the command log after
//! the code under test has dropped its handles.

use super::{DeviceSession, RecordingOptions, SessionConnector};
use crate::capabilities::CapabilitySet;
use crate::config::SessionTimeouts;
use crate::result::{HandsetError, HandsetResult};
use reqwest::Url;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 1x1 transparent PNG
const PNG_PIXEL: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// `ftyp` box header of an MP4 container
const MP4_STUB: &[u8] = &[
    0x00, 0x00, 0x00, 0x18, 0x66, 0x74, 0x79, 0x70, 0x6D, 0x70, 0x34, 0x32, 0x00, 0x00, 0x00, 0x00,
    0x6D, 0x70, 0x34, 0x32, 0x69, 0x73, 0x6F, 0x6D,
];

/// Commands that should fail on the mock device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct MockFailures {
    /// `connect` fails
    pub connect: bool,
    /// `set_timeouts` fails
    pub set_timeouts: bool,
    /// `screenshot` fails
    pub screenshot: bool,
    /// `start_recording` fails
    pub start_recording: bool,
    /// `stop_recording` fails
    pub stop_recording: bool,
    /// `terminate_app` fails
    pub terminate_app: bool,
    /// `background_app` fails
    pub background_app: bool,
    /// `quit` fails
    pub quit: bool,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<String>,
    failures: MockFailures,
    capabilities: BTreeMap<String, Value>,
    live_sessions: BTreeSet<String>,
    recording: bool,
    connected: Vec<CapabilitySet>,
}

/// Shared state of a simulated device
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Create a healthy device
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the failure switches
    pub fn set_failures(&self, failures: MockFailures) {
        self.state().failures = failures;
    }

    /// Report a capability from every session on this device
    pub fn set_capability(&self, name: &str, value: impl Into<Value>) {
        let _ = self.state().capabilities.insert(name.to_string(), value.into());
    }

    /// Command log, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Whether any logged command starts with `prefix`
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.state().calls.iter().any(|c| c.starts_with(prefix))
    }

    /// Sessions opened and not yet quit
    #[must_use]
    pub fn live_sessions(&self) -> Vec<String> {
        self.state().live_sessions.iter().cloned().collect()
    }

    /// Whether a recording is in progress
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.state().recording
    }

    /// Capability sets received by `connect`, oldest first
    #[must_use]
    pub fn connected_with(&self) -> Vec<CapabilitySet> {
        self.state().connected.clone()
    }

    /// Open a session on this device without going through a connector
    #[must_use]
    pub fn session(&self, id: &str) -> Box<dyn DeviceSession> {
        let _ = self.state().live_sessions.insert(id.to_string());
        Box::new(MockSession {
            id: id.to_string(),
            device: self.clone(),
            capabilities: BTreeMap::new(),
        })
    }

    fn record(&self, call: String, fails: impl Fn(&MockFailures) -> bool) -> HandsetResult<()> {
        let mut state = self.state();
        state.calls.push(call.clone());
        if fails(&state.failures) {
            return Err(HandsetError::webdriver(call, "injected mock failure"));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct MockSession {
    id: String,
    device: MockDevice,
    capabilities: BTreeMap<String, Value>,
}

impl DeviceSession for MockSession {
    fn session_id(&self) -> &str {
        &self.id
    }

    fn set_timeouts(&self, timeouts: &SessionTimeouts) -> HandsetResult<()> {
        self.device.record(
            format!(
                "set_timeouts:{}/{}/{}",
                timeouts.implicit_wait.as_millis(),
                timeouts.page_load.as_millis(),
                timeouts.script.as_millis()
            ),
            |f| f.set_timeouts,
        )
    }

    fn screenshot(&self) -> HandsetResult<Vec<u8>> {
        self.device
            .record("screenshot".to_string(), |f| f.screenshot)
            .map_err(|e| HandsetError::Screenshot {
                message: e.to_string(),
            })?;
        Ok(PNG_PIXEL.to_vec())
    }

    fn start_recording(&self, options: &RecordingOptions) -> HandsetResult<()> {
        self.device
            .record(format!("start_recording:{}", options.time_limit), |f| {
                f.start_recording
            })?;
        self.device.state().recording = true;
        Ok(())
    }

    fn stop_recording(&self) -> HandsetResult<Vec<u8>> {
        self.device
            .record("stop_recording".to_string(), |f| f.stop_recording)?;
        let mut state = self.device.state();
        if !state.recording {
            return Err(HandsetError::Recording {
                message: "no recording in progress".to_string(),
            });
        }
        state.recording = false;
        Ok(MP4_STUB.to_vec())
    }

    fn terminate_app(&self, app_id: &str) -> HandsetResult<bool> {
        self.device
            .record(format!("terminate_app:{app_id}"), |f| f.terminate_app)?;
        Ok(true)
    }

    fn activate_app(&self, app_id: &str) -> HandsetResult<()> {
        self.device
            .record(format!("activate_app:{app_id}"), |_| false)
    }

    fn background_app(&self, seconds: i64) -> HandsetResult<()> {
        self.device
            .record(format!("background_app:{seconds}"), |f| f.background_app)
    }

    fn capability(&self, name: &str) -> Option<Value> {
        self.device
            .state()
            .capabilities
            .get(name)
            .cloned()
            .or_else(|| self.capabilities.get(name).cloned())
    }

    fn quit(&self) -> HandsetResult<()> {
        let result = self
            .device
            .record(format!("quit:{}", self.id), |f| f.quit);
        // The server-side session is gone either way
        let _ = self.device.state().live_sessions.remove(&self.id);
        result
    }
}

/// Connector that opens sessions on a [`MockDevice`]
#[derive(Debug, Default)]
pub struct MockConnector {
    device: MockDevice,
    next_id: AtomicU64,
}

impl MockConnector {
    /// Connector for a fresh device
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector for an existing device
    #[must_use]
    pub fn with_device(device: MockDevice) -> Self {
        Self {
            device,
            next_id: AtomicU64::new(0),
        }
    }

    /// The simulated device
    #[must_use]
    pub const fn device(&self) -> &MockDevice {
        &self.device
    }
}

impl SessionConnector for MockConnector {
    fn connect(
        &self,
        endpoint: &Url,
        capabilities: &CapabilitySet,
    ) -> HandsetResult<Box<dyn DeviceSession>> {
        self.device
            .record(format!("connect:{endpoint}"), |f| f.connect)
            .map_err(|e| HandsetError::SessionCreation {
                message: e.to_string(),
            })?;
        self.device.state().connected.push(capabilities.clone());

        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let _ = self.device.state().live_sessions.insert(id.clone());

        // Appium echoes capabilities back without the vendor prefix
        let reported = capabilities
            .iter()
            .map(|(name, value)| {
                (
                    name.strip_prefix("appium:").unwrap_or(name).to_string(),
                    value.clone(),
                )
            })
            .collect();

        Ok(Box::new(MockSession {
            id,
            device: self.device.clone(),
            capabilities: reported,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::platform::Platform;

    fn caps() -> CapabilitySet {
        let settings = Settings::from_pairs([
            ("android.app.path", "/missing.apk"),
            ("android.app.package", "com.example"),
            ("android.app.activity", ".Main"),
            ("framework.device.name", "Pixel 7"),
        ])
        .unwrap();
        CapabilitySet::for_platform(&settings, Platform::Android).unwrap()
    }

    #[test]
    fn test_connect_reports_unprefixed_capabilities() {
        let connector = MockConnector::new();
        let url = Url::parse("http://127.0.0.1:4723").unwrap();
        let session = connector.connect(&url, &caps()).unwrap();

        assert_eq!(session.session_id(), "mock-1");
        assert_eq!(
            session.capability("deviceName").and_then(|v| v.as_str().map(String::from)),
            Some("Pixel 7".to_string())
        );
        assert_eq!(connector.device().live_sessions(), vec!["mock-1".to_string()]);
    }

    #[test]
    fn test_recording_round() {
        let device = MockDevice::new();
        let session = device.session("s");
        let options = RecordingOptions {
            time_limit: 10,
            bit_rate: None,
            video_type: None,
            video_quality: None,
            force_restart: true,
        };
        assert!(session.stop_recording().is_err());
        session.start_recording(&options).unwrap();
        assert!(device.is_recording());
        let bytes = session.stop_recording().unwrap();
        assert!(!bytes.is_empty());
        assert!(!device.is_recording());
    }

    #[test]
    fn test_injected_failures() {
        let device = MockDevice::new();
        device.set_failures(MockFailures {
            screenshot: true,
            quit: true,
            ..MockFailures::default()
        });
        let session = device.session("s");
        assert!(matches!(session.screenshot(), Err(HandsetError::Screenshot { .. })));
        assert!(session.quit().is_err());
        assert!(device.live_sessions().is_empty());
        assert!(device.was_called("quit:s"));
    }
}
