//! Session handles
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SessionHandle (tagged: chosen once at creation)             │
//! │                                                              │
//! │   ┌──────────────────┐          ┌──────────────────┐         │
//! │   │ Android          │          │ Ios              │         │
//! │   │  app package     │          │  bundle id       │         │
//! │   └────────┬─────────┘          └────────┬─────────┘         │
//! │            └──────────┬──────────────────┘                   │
//! │                 Box<dyn DeviceSession>                       │
//! │          ┌────────────┴────────────┐                         │
//! │    AppiumSession (HTTP)      MockSession (tests)             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call is blocking; timeouts are enforced by the Appium server using
//! the policies applied at creation.

mod mock;
mod webdriver;

pub use mock::{MockConnector, MockDevice, MockFailures};
pub use webdriver::{server_status, AppiumSession, WebDriverConnector};

use crate::capabilities::CapabilitySet;
use crate::config::SessionTimeouts;
use crate::platform::Platform;
use crate::result::HandsetResult;
use reqwest::Url;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Options passed to `start_recording_screen`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingOptions {
    /// Maximum recording length in seconds
    pub time_limit: u64,
    /// Android: bit rate in bits per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
    /// iOS: container/codec
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_type: Option<String>,
    /// iOS: quality preset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_quality: Option<String>,
    /// Stop any recording already in progress before starting
    pub force_restart: bool,
}

/// One live automation session with one device
///
/// Implementations issue blocking commands; they are `Send + Sync` so a
/// handle can be shared behind an `Arc` with the registry.
pub trait DeviceSession: Send + Sync + fmt::Debug {
    /// Server-assigned session id
    fn session_id(&self) -> &str;

    /// Apply element-lookup, page-load and script timeouts
    fn set_timeouts(&self, timeouts: &SessionTimeouts) -> HandsetResult<()>;

    /// PNG screenshot of the current screen
    fn screenshot(&self) -> HandsetResult<Vec<u8>>;

    /// Begin a screen recording
    fn start_recording(&self, options: &RecordingOptions) -> HandsetResult<()>;

    /// End the active screen recording and return its MP4 bytes
    fn stop_recording(&self) -> HandsetResult<Vec<u8>>;

    /// Force-stop an application; returns whether it was running
    fn terminate_app(&self, app_id: &str) -> HandsetResult<bool>;

    /// Bring an application to the foreground, launching it if needed
    fn activate_app(&self, app_id: &str) -> HandsetResult<()>;

    /// Send the foreground application to the background for `seconds`
    fn background_app(&self, seconds: i64) -> HandsetResult<()>;

    /// Capability reported by the server when the session was created
    fn capability(&self, name: &str) -> Option<serde_json::Value>;

    /// End the session on the server
    fn quit(&self) -> HandsetResult<()>;
}

/// Opens sessions against an automation server
pub trait SessionConnector: Send + Sync {
    /// Create a session with the given capabilities
    fn connect(
        &self,
        endpoint: &Url,
        capabilities: &CapabilitySet,
    ) -> HandsetResult<Box<dyn DeviceSession>>;
}

/// Android session: the app is addressed by package name
#[derive(Debug)]
pub struct AndroidSession {
    session: Box<dyn DeviceSession>,
    app_package: String,
}

/// iOS session: the app is addressed by bundle id
#[derive(Debug)]
pub struct IosSession {
    session: Box<dyn DeviceSession>,
    bundle_id: String,
}

/// Platform-specific session handle
#[derive(Debug)]
pub enum SessionHandle {
    /// Android device session
    Android(AndroidSession),
    /// iOS device session
    Ios(IosSession),
}

impl SessionHandle {
    /// Wrap a raw session in the variant matching `platform`
    #[must_use]
    pub fn new(platform: Platform, session: Box<dyn DeviceSession>, app_id: impl Into<String>) -> Self {
        match platform {
            Platform::Android => Self::Android(AndroidSession {
                session,
                app_package: app_id.into(),
            }),
            Platform::Ios => Self::Ios(IosSession {
                session,
                bundle_id: app_id.into(),
            }),
        }
    }

    fn session(&self) -> &dyn DeviceSession {
        match self {
            Self::Android(android) => android.session.as_ref(),
            Self::Ios(ios) => ios.session.as_ref(),
        }
    }

    /// Platform of this handle
    #[must_use]
    pub const fn platform(&self) -> Platform {
        match self {
            Self::Android(_) => Platform::Android,
            Self::Ios(_) => Platform::Ios,
        }
    }

    /// Server-assigned session id
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.session().session_id()
    }

    /// Application under test
    #[must_use]
    pub fn app_id(&self) -> &str {
        match self {
            Self::Android(android) => &android.app_package,
            Self::Ios(ios) => &ios.bundle_id,
        }
    }

    /// Platform name reported by the server, falling back to the variant
    #[must_use]
    pub fn platform_name(&self) -> String {
        self.session()
            .capability("platformName")
            .and_then(|v| v.as_str().map(ToString::to_string))
            .unwrap_or_else(|| self.platform().capability_name().to_string())
    }

    /// Device name reported by the server
    #[must_use]
    pub fn device_name(&self) -> String {
        let session = self.session();
        ["deviceName", "appium:deviceName", "deviceUDID"]
            .iter()
            .find_map(|name| {
                session
                    .capability(name)
                    .and_then(|v| v.as_str().map(ToString::to_string))
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Apply session timeouts
    pub fn set_timeouts(&self, timeouts: &SessionTimeouts) -> HandsetResult<()> {
        self.session().set_timeouts(timeouts)
    }

    /// PNG screenshot
    pub fn screenshot(&self) -> HandsetResult<Vec<u8>> {
        self.session().screenshot()
    }

    /// Recording options suited to the platform
    #[must_use]
    pub fn recording_options(&self, time_limit: Duration) -> RecordingOptions {
        let time_limit = time_limit.as_secs();
        match self {
            Self::Android(_) => RecordingOptions {
                time_limit,
                bit_rate: Some(4_000_000),
                video_type: None,
                video_quality: None,
                force_restart: true,
            },
            Self::Ios(_) => RecordingOptions {
                time_limit,
                bit_rate: None,
                video_type: Some("mpeg4".to_string()),
                video_quality: Some("medium".to_string()),
                force_restart: true,
            },
        }
    }

    /// Start a screen recording
    pub fn start_recording(&self, time_limit: Duration) -> HandsetResult<()> {
        let options = self.recording_options(time_limit);
        self.session().start_recording(&options)
    }

    /// Stop the screen recording and return MP4 bytes
    pub fn stop_recording(&self) -> HandsetResult<Vec<u8>> {
        self.session().stop_recording()
    }

    /// Force-stop and relaunch the application under test
    pub fn restart_app(&self) -> HandsetResult<()> {
        let app_id = self.app_id();
        let was_running = self.session().terminate_app(app_id)?;
        tracing::debug!(app = app_id, was_running, "application terminated");
        self.session().activate_app(app_id)
    }

    /// Background the application for `seconds`, then restore it
    pub fn background(&self, seconds: i64) -> HandsetResult<()> {
        self.session().background_app(seconds)
    }

    /// End the session
    pub fn quit(&self) -> HandsetResult<()> {
        self.session().quit()
    }
}
