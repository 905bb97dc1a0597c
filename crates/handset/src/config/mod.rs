//! Configuration Provider
//!
//! Settings are resolved once at start-up from layered sources, highest
//! precedence first:
//!
//! ```text
//! runtime override (--set k=v)
//!   > HANDSET__* environment variables
//!   > <config_dir>/<environment>.yaml
//!   > <config_dir>/default.yaml
//!   > compiled-in default
//! ```
//!
//! Missing optional keys fall back to their defaults. Malformed sources or
//! values fail the load; there is no partially-loaded configuration.

mod source;
mod value;

pub use source::{parse_assignment, Layer, ResolvedValue, ENV_PREFIX};

use crate::platform::Platform;
use crate::result::{HandsetError, HandsetResult};
use ortho_config::figment::{Error as FigmentError, Figment};
use serde::{Deserialize, Serialize};
use source::Sources;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the active environment file
pub const ENVIRONMENT_VAR: &str = "HANDSET_ENV";

/// Name of the base configuration file inside the config directory
pub const BASE_FILE: &str = "default.yaml";

/// How to locate and layer configuration sources
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory holding `default.yaml` and `<environment>.yaml`
    pub config_dir: Option<PathBuf>,
    /// Environment name (selects `<environment>.yaml`)
    pub environment: Option<String>,
    /// Runtime overrides, highest precedence
    pub overrides: Vec<(String, String)>,
    /// Whether to read `HANDSET__*` variables from the process environment
    pub read_process_env: bool,
}

impl LoadOptions {
    /// Create options with no sources
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration directory
    #[must_use]
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Set the environment name
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Add a runtime override
    #[must_use]
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Read `HANDSET__*` overrides and, if no environment was given,
    /// `HANDSET_ENV` from the process environment
    #[must_use]
    pub fn from_process_env(mut self) -> Self {
        self.read_process_env = true;
        if self.environment.is_none() {
            self.environment = std::env::var(ENVIRONMENT_VAR)
                .ok()
                .filter(|e| !e.trim().is_empty());
        }
        self
    }
}

/// Per-command timeouts applied to every new session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionTimeouts {
    /// Element lookup wait
    pub implicit_wait: Duration,
    /// Page / content load wait
    pub page_load: Duration,
    /// Script execution wait
    pub script: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        RawTimeouts::default().into()
    }
}

/// Device selection shared by both platforms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// `framework.device.name` (default `emulator-5554`)
    #[serde(deserialize_with = "value::text")]
    pub name: String,
    /// `framework.device.platform_version`
    #[serde(deserialize_with = "value::optional_text")]
    pub platform_version: Option<String>,
    /// `framework.device.udid`
    #[serde(deserialize_with = "value::optional_text")]
    pub udid: Option<String>,
    /// `framework.device.new_command_timeout_secs` (default 300)
    #[serde(deserialize_with = "value::unsigned")]
    pub new_command_timeout_secs: u64,
    /// `framework.device.no_reset` (default false)
    #[serde(deserialize_with = "value::flag")]
    pub no_reset: bool,
    /// `framework.device.full_reset` (default false)
    #[serde(deserialize_with = "value::flag")]
    pub full_reset: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            name: "emulator-5554".to_string(),
            platform_version: None,
            udid: None,
            new_command_timeout_secs: 300,
            no_reset: false,
            full_reset: false,
        }
    }
}

/// When screenshots are captured (`framework.screenshot.*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotPolicy {
    #[serde(deserialize_with = "value::flag")]
    pub on_start: bool,
    #[serde(deserialize_with = "value::flag")]
    pub on_pass: bool,
    #[serde(deserialize_with = "value::flag")]
    pub on_failure: bool,
    #[serde(deserialize_with = "value::flag")]
    pub on_end: bool,
}

impl Default for ScreenshotPolicy {
    fn default() -> Self {
        Self {
            on_start: true,
            on_pass: false,
            on_failure: true,
            on_end: true,
        }
    }
}

/// Screen recording and its retention (`framework.video.*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoPolicy {
    /// Record every scenario (default true)
    #[serde(deserialize_with = "value::flag")]
    pub enabled: bool,
    /// Drop the recording of a passed scenario (default true)
    #[serde(deserialize_with = "value::flag")]
    pub delete_on_pass: bool,
    /// Upper bound handed to the recorder (default 1800)
    #[serde(deserialize_with = "value::unsigned")]
    pub time_limit_secs: u64,
}

impl Default for VideoPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            delete_on_pass: true,
            time_limit_secs: 1800,
        }
    }
}

/// Reporting back-end toggles
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSettings {
    /// `framework.report.allure.enabled` (default true)
    pub allure_enabled: bool,
    /// `framework.report.html.enabled` (default true)
    pub html_enabled: bool,
    /// `framework.report.suite_name` (default `Mobile Suite`)
    pub suite_name: String,
}

/// Framework-wide settings (`framework.*`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameworkSettings {
    /// `framework.platform` (default `android`)
    pub platform: Platform,
    /// `framework.appium.url` (default `http://127.0.0.1:4723`)
    pub appium_url: String,
    /// Device selection
    pub device: DeviceSettings,
    /// `framework.timeouts.*`
    pub timeouts: SessionTimeouts,
    /// `framework.screenshot.*`
    pub screenshots: ScreenshotPolicy,
    /// `framework.video.*`
    pub video: VideoPolicy,
    /// `framework.report.*`
    pub report: ReportSettings,
    /// `framework.output.dir` (default `target/handset`)
    pub output_dir: PathBuf,
    /// `framework.retention.days` (default 7)
    pub retention: Duration,
}

impl Default for FrameworkSettings {
    fn default() -> Self {
        RawFramework::default().into_settings(Platform::Android)
    }
}

/// Android automation settings (`android.*`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AndroidSettings {
    /// `android.automation_name` (default `UiAutomator2`)
    pub automation_name: String,
    /// `android.app.path` (default `apps/app.apk`)
    pub app_path: PathBuf,
    /// `android.app.package`
    pub app_package: Option<String>,
    /// `android.app.activity`
    pub app_activity: Option<String>,
    /// `android.app.wait_activity`
    pub app_wait_activity: Option<String>,
    /// `android.auto_grant_permissions` (default true)
    pub auto_grant_permissions: bool,
    /// `android.disable_window_animation` (default true)
    pub disable_window_animation: bool,
    /// `android.ignore_hidden_api_policy_error` (default true)
    pub ignore_hidden_api_policy_error: bool,
    /// `android.adb_exec_timeout_ms` (default 60000)
    pub adb_exec_timeout_ms: u64,
    /// `android.server_install_timeout_ms` (default 90000)
    pub server_install_timeout_ms: u64,
    /// `android.system_port`
    pub system_port: Option<u64>,
}

/// iOS automation settings (`ios.*`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IosSettings {
    /// `ios.automation_name` (default `XCUITest`)
    #[serde(deserialize_with = "value::text")]
    pub automation_name: String,
    /// `ios.app.path` (default `apps/app.app`)
    #[serde(rename(deserialize = "app"), deserialize_with = "app_path")]
    pub app_path: PathBuf,
    /// `ios.bundle_id`
    #[serde(deserialize_with = "value::optional_text")]
    pub bundle_id: Option<String>,
    /// `ios.auto_accept_alerts` (default true)
    #[serde(deserialize_with = "value::flag")]
    pub auto_accept_alerts: bool,
    /// `ios.wda_launch_timeout_ms` (default 120000)
    #[serde(deserialize_with = "value::unsigned")]
    pub wda_launch_timeout_ms: u64,
    /// `ios.use_prebuilt_wda` (default false)
    #[serde(deserialize_with = "value::flag")]
    pub use_prebuilt_wda: bool,
    /// `ios.wda_local_port`
    #[serde(deserialize_with = "value::optional_unsigned")]
    pub wda_local_port: Option<u64>,
}

impl Default for IosSettings {
    fn default() -> Self {
        Self {
            automation_name: "XCUITest".to_string(),
            app_path: PathBuf::from("apps/app.app"),
            bundle_id: None,
            auto_accept_alerts: true,
            wda_launch_timeout_ms: 120_000,
            use_prebuilt_wda: false,
            wda_local_port: None,
        }
    }
}

// File-shaped groups. Each carries its own defaults so a missing key and a
// missing file resolve identically.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrameworkRoot {
    framework: RawFramework,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AndroidRoot {
    android: RawAndroid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IosRoot {
    ios: IosSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawFramework {
    #[serde(deserialize_with = "value::text")]
    platform: String,
    appium: RawAppium,
    device: DeviceSettings,
    timeouts: RawTimeouts,
    screenshot: ScreenshotPolicy,
    video: VideoPolicy,
    report: RawReport,
    output: RawOutput,
    retention: RawRetention,
}

impl RawFramework {
    fn into_settings(self, platform: Platform) -> FrameworkSettings {
        FrameworkSettings {
            platform,
            appium_url: self.appium.url,
            device: self.device,
            timeouts: self.timeouts.into(),
            screenshots: self.screenshot,
            video: self.video,
            report: ReportSettings {
                allure_enabled: self.report.allure.enabled,
                html_enabled: self.report.html.enabled,
                suite_name: self.report.suite_name,
            },
            output_dir: PathBuf::from(self.output.dir),
            retention: days(self.retention.days),
        }
    }
}

impl Default for RawFramework {
    fn default() -> Self {
        Self {
            platform: "android".to_string(),
            appium: RawAppium::default(),
            device: DeviceSettings::default(),
            timeouts: RawTimeouts::default(),
            screenshot: ScreenshotPolicy::default(),
            video: VideoPolicy::default(),
            report: RawReport::default(),
            output: RawOutput::default(),
            retention: RawRetention::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawAppium {
    #[serde(deserialize_with = "value::text")]
    url: String,
}

impl Default for RawAppium {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4723".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawTimeouts {
    #[serde(deserialize_with = "value::unsigned")]
    implicit_wait_secs: u64,
    #[serde(deserialize_with = "value::unsigned")]
    page_load_secs: u64,
    #[serde(deserialize_with = "value::unsigned")]
    script_secs: u64,
}

impl Default for RawTimeouts {
    fn default() -> Self {
        Self {
            implicit_wait_secs: 10,
            page_load_secs: 30,
            script_secs: 30,
        }
    }
}

impl From<RawTimeouts> for SessionTimeouts {
    fn from(raw: RawTimeouts) -> Self {
        Self {
            implicit_wait: Duration::from_secs(raw.implicit_wait_secs),
            page_load: Duration::from_secs(raw.page_load_secs),
            script: Duration::from_secs(raw.script_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawReport {
    allure: RawToggle,
    html: RawToggle,
    #[serde(deserialize_with = "value::text")]
    suite_name: String,
}

impl Default for RawReport {
    fn default() -> Self {
        Self {
            allure: RawToggle::default(),
            html: RawToggle::default(),
            suite_name: "Mobile Suite".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawToggle {
    #[serde(deserialize_with = "value::flag")]
    enabled: bool,
}

impl Default for RawToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawOutput {
    #[serde(deserialize_with = "value::text")]
    dir: String,
}

impl Default for RawOutput {
    fn default() -> Self {
        Self {
            dir: "target/handset".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawRetention {
    #[serde(deserialize_with = "value::unsigned")]
    days: u64,
}

impl Default for RawRetention {
    fn default() -> Self {
        Self { days: 7 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawAndroid {
    #[serde(deserialize_with = "value::text")]
    automation_name: String,
    app: RawAndroidApp,
    #[serde(deserialize_with = "value::flag")]
    auto_grant_permissions: bool,
    #[serde(deserialize_with = "value::flag")]
    disable_window_animation: bool,
    #[serde(deserialize_with = "value::flag")]
    ignore_hidden_api_policy_error: bool,
    #[serde(deserialize_with = "value::unsigned")]
    adb_exec_timeout_ms: u64,
    #[serde(deserialize_with = "value::unsigned")]
    server_install_timeout_ms: u64,
    #[serde(deserialize_with = "value::optional_unsigned")]
    system_port: Option<u64>,
}

impl Default for RawAndroid {
    fn default() -> Self {
        Self {
            automation_name: "UiAutomator2".to_string(),
            app: RawAndroidApp::default(),
            auto_grant_permissions: true,
            disable_window_animation: true,
            ignore_hidden_api_policy_error: true,
            adb_exec_timeout_ms: 60_000,
            server_install_timeout_ms: 90_000,
            system_port: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawAndroidApp {
    #[serde(deserialize_with = "value::text")]
    path: String,
    #[serde(deserialize_with = "value::optional_text")]
    package: Option<String>,
    #[serde(deserialize_with = "value::optional_text")]
    activity: Option<String>,
    #[serde(deserialize_with = "value::optional_text")]
    wait_activity: Option<String>,
}

impl Default for RawAndroidApp {
    fn default() -> Self {
        Self {
            path: "apps/app.apk".to_string(),
            package: None,
            activity: None,
            wait_activity: None,
        }
    }
}

impl From<RawAndroid> for AndroidSettings {
    fn from(raw: RawAndroid) -> Self {
        Self {
            automation_name: raw.automation_name,
            app_path: PathBuf::from(raw.app.path),
            app_package: raw.app.package,
            app_activity: raw.app.activity,
            app_wait_activity: raw.app.wait_activity,
            auto_grant_permissions: raw.auto_grant_permissions,
            disable_window_animation: raw.disable_window_animation,
            ignore_hidden_api_policy_error: raw.ignore_hidden_api_policy_error,
            adb_exec_timeout_ms: raw.adb_exec_timeout_ms,
            server_install_timeout_ms: raw.server_install_timeout_ms,
            system_port: raw.system_port,
        }
    }
}

/// `ios.app` is a group holding `path`
fn app_path<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<PathBuf, D::Error> {
    #[derive(Deserialize)]
    #[serde(default)]
    struct App {
        #[serde(deserialize_with = "value::text")]
        path: String,
    }
    impl Default for App {
        fn default() -> Self {
            Self {
                path: "apps/app.app".to_string(),
            }
        }
    }
    App::deserialize(deserializer).map(|app| PathBuf::from(app.path))
}

const fn days(count: u64) -> Duration {
    Duration::from_secs(count * 24 * 60 * 60)
}

/// Resolved, read-only configuration
///
/// Built once per process and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Settings {
    figment: Figment,
    resolved: BTreeMap<String, ResolvedValue>,
    environment: Option<String>,
    framework: FrameworkSettings,
    android: Option<AndroidSettings>,
    ios: Option<IosSettings>,
}

impl Settings {
    /// Load and resolve all sources described by `options`
    pub fn load(options: &LoadOptions) -> HandsetResult<Self> {
        let mut sources = Sources::new();

        if let Some(dir) = &options.config_dir {
            let base = dir.join(BASE_FILE);
            if base.is_file() {
                sources.yaml_file(Layer::BaseFile, &base)?;
            } else {
                tracing::debug!(path = %base.display(), "no base configuration file");
            }
        }

        if let Some(environment) = &options.environment {
            let dir = options
                .config_dir
                .as_deref()
                .unwrap_or_else(|| Path::new("."));
            let path = dir.join(format!("{environment}.yaml"));
            if !path.is_file() {
                return Err(HandsetError::config(format!(
                    "environment '{environment}' selected but {} does not exist",
                    path.display()
                )));
            }
            sources.yaml_file(Layer::EnvironmentFile, &path)?;
        }

        if options.read_process_env {
            sources.environment_variables();
        }

        sources.overrides(options.overrides.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let settings = Self::from_sources(sources, options.environment.clone())?;
        tracing::info!(
            environment = settings.environment().unwrap_or("default"),
            platform = %settings.platform(),
            keys = settings.resolved.len(),
            "configuration loaded"
        );
        Ok(settings)
    }

    /// Settings from override pairs only (every other key at its default)
    pub fn from_pairs<K, V, I>(pairs: I) -> HandsetResult<Self>
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut sources = Sources::new();
        sources.overrides(pairs);
        Self::from_sources(sources, None)
    }

    /// The framework group and the active platform's group are extracted
    /// eagerly so that malformed values surface at load.
    fn from_sources(sources: Sources, environment: Option<String>) -> HandsetResult<Self> {
        let (figment, resolved) = sources.resolve()?;
        let raw = figment
            .extract::<FrameworkRoot>()
            .map_err(config_error)?
            .framework;

        let platform: Platform = raw.platform.parse()?;
        let framework = raw.into_settings(platform);

        let mut settings = Self {
            figment,
            resolved,
            environment,
            framework,
            android: None,
            ios: None,
        };
        match settings.framework.platform {
            Platform::Android => settings.android = Some(settings.extract_android()?),
            Platform::Ios => settings.ios = Some(settings.extract_ios()?),
        }
        Ok(settings)
    }

    /// String value, or `default` when unset
    #[must_use]
    pub fn string(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or(default).to_string()
    }

    /// String value, `None` when unset or blank
    #[must_use]
    pub fn optional_string(&self, key: &str) -> Option<String> {
        self.raw(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
    }

    /// Integer value, or `default` when unset
    pub fn int(&self, key: &str, default: i64) -> HandsetResult<i64> {
        match self.raw(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                HandsetError::config(format!("'{key}' must be an integer, got '{raw}'"))
            }),
        }
    }

    /// Boolean value, or `default` when unset
    pub fn bool(&self, key: &str, default: bool) -> HandsetResult<bool> {
        match self.raw(key) {
            None => Ok(default),
            Some(raw) => value::parse_bool(raw).ok_or_else(|| {
                HandsetError::config(format!("'{key}' must be true or false, got '{raw}'"))
            }),
        }
    }

    /// Whether a key has a value from any source
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.resolved.contains_key(key)
    }

    /// Every key with a value, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.resolved.keys().map(String::as_str)
    }

    /// Layer that supplied a key, if any
    #[must_use]
    pub fn source_of(&self, key: &str) -> Option<Layer> {
        self.resolved.get(key).map(|r| r.layer)
    }

    /// Every resolved key with its value and provenance
    #[must_use]
    pub const fn resolved(&self) -> &BTreeMap<String, ResolvedValue> {
        &self.resolved
    }

    /// Active environment name
    #[must_use]
    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// Framework-wide settings
    #[must_use]
    pub const fn framework(&self) -> &FrameworkSettings {
        &self.framework
    }

    /// Platform selected for this run
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.framework.platform
    }

    /// Android settings (resolved on demand when Android is not the active platform)
    pub fn android(&self) -> HandsetResult<AndroidSettings> {
        match &self.android {
            Some(android) => Ok(android.clone()),
            None => self.extract_android(),
        }
    }

    /// iOS settings (resolved on demand when iOS is not the active platform)
    pub fn ios(&self) -> HandsetResult<IosSettings> {
        match &self.ios {
            Some(ios) => Ok(ios.clone()),
            None => self.extract_ios(),
        }
    }

    fn raw(&self, key: &str) -> Option<&str> {
        self.resolved.get(key).map(|r| r.value.as_str())
    }

    fn extract_android(&self) -> HandsetResult<AndroidSettings> {
        self.figment
            .extract::<AndroidRoot>()
            .map(|root| root.android.into())
            .map_err(config_error)
    }

    fn extract_ios(&self) -> HandsetResult<IosSettings> {
        self.figment
            .extract::<IosRoot>()
            .map(|root| root.ios)
            .map_err(config_error)
    }
}

fn config_error(error: FigmentError) -> HandsetError {
    if error.path.is_empty() {
        HandsetError::config(format!("invalid configuration: {error}"))
    } else {
        HandsetError::config(format!("'{}': {}", error.path.join("."), error.kind))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    mod defaults_tests {
        use super::*;

        #[test]
        fn test_defaults_without_sources() {
            let settings = Settings::load(&LoadOptions::new()).unwrap();
            let fw = settings.framework();
            assert_eq!(fw.platform, Platform::Android);
            assert_eq!(fw.appium_url, "http://127.0.0.1:4723");
            assert_eq!(fw.timeouts.implicit_wait, Duration::from_secs(10));
            assert!(fw.screenshots.on_failure);
            assert!(!fw.screenshots.on_pass);
            assert!(fw.video.delete_on_pass);
            assert_eq!(fw.retention, Duration::from_secs(7 * 86_400));
            assert!(settings.environment().is_none());
        }

        #[test]
        fn test_missing_key_uses_default() {
            let settings = Settings::from_pairs::<&str, &str, _>([]).unwrap();
            assert_eq!(settings.string("no.such.key", "fallback"), "fallback");
            assert_eq!(settings.int("no.such.key", 42).unwrap(), 42);
            assert!(settings.bool("no.such.key", true).unwrap());
            assert!(!settings.contains("no.such.key"));
        }
    }

    mod accessor_tests {
        use super::*;

        #[test]
        fn test_typed_accessors() {
            let settings = Settings::from_pairs([
                ("a.int", "17"),
                ("a.bool", "Yes"),
                ("a.str", "hello"),
                ("a.blank", "   "),
            ])
            .unwrap();
            assert_eq!(settings.int("a.int", 0).unwrap(), 17);
            assert!(settings.bool("a.bool", false).unwrap());
            assert_eq!(settings.string("a.str", ""), "hello");
            assert_eq!(settings.optional_string("a.blank"), None);
            assert_eq!(settings.source_of("a.int"), Some(Layer::Override));
            assert!(settings.contains("a.str"));
            assert_eq!(
                settings.keys().collect::<Vec<_>>(),
                vec!["a.blank", "a.bool", "a.int", "a.str"]
            );
        }

        #[test]
        fn test_malformed_values_are_errors() {
            let settings = Settings::from_pairs([("a.int", "twelve"), ("a.bool", "maybe")]).unwrap();
            assert!(settings.int("a.int", 0).is_err());
            assert!(settings.bool("a.bool", false).is_err());
        }

        #[test]
        fn test_malformed_framework_value_fails_load() {
            let err = Settings::from_pairs([("framework.video.enabled", "sometimes")]).unwrap_err();
            assert!(err.to_string().contains("framework.video.enabled"));
        }

        #[test]
        fn test_negative_timeout_fails_load() {
            let err = Settings::from_pairs([("framework.timeouts.script_secs", "-5")]).unwrap_err();
            assert!(err.to_string().contains("negative"));
        }

        #[test]
        fn test_unsupported_platform_fails_load() {
            let err = Settings::from_pairs([("framework.platform", "symbian")]).unwrap_err();
            assert!(matches!(err, HandsetError::UnsupportedPlatform { .. }));
        }
    }

    mod layering_tests {
        use super::*;

        #[test]
        fn test_precedence_override_env_file_base() {
            let dir = TempDir::new().unwrap();
            write(
                dir.path(),
                "default.yaml",
                "framework:\n  device:\n    name: base-device\n  appium:\n    url: http://base:4723\n  retention:\n    days: 3\n",
            );
            write(
                dir.path(),
                "staging.yaml",
                "framework:\n  device:\n    name: staging-device\n  appium:\n    url: http://staging:4723\n",
            );

            let options = LoadOptions::new()
                .with_config_dir(dir.path())
                .with_environment("staging")
                .with_override("framework.appium.url", "http://override:4723");
            let settings = Settings::load(&options).unwrap();

            assert_eq!(settings.framework().appium_url, "http://override:4723");
            assert_eq!(settings.framework().device.name, "staging-device");
            assert_eq!(settings.framework().retention, Duration::from_secs(3 * 86_400));
            assert_eq!(settings.source_of("framework.device.name"), Some(Layer::EnvironmentFile));
            assert_eq!(settings.source_of("framework.retention.days"), Some(Layer::BaseFile));
            assert_eq!(settings.environment(), Some("staging"));
        }

        #[test]
        fn test_environment_variable_beats_environment_file() {
            let dir = TempDir::new().unwrap();
            write(dir.path(), "ci.yaml", "framework:\n  device:\n    udid: from-file\n    platform_version: 14\n");
            std::env::set_var("HANDSET__FRAMEWORK__DEVICE__UDID", "from-env");

            let options = LoadOptions {
                config_dir: Some(dir.path().to_path_buf()),
                environment: Some("ci".to_string()),
                overrides: Vec::new(),
                read_process_env: true,
            };
            let result = Settings::load(&options);
            std::env::remove_var("HANDSET__FRAMEWORK__DEVICE__UDID");
            let settings = result.unwrap();

            let device = &settings.framework().device;
            assert_eq!(device.udid.as_deref(), Some("from-env"));
            assert_eq!(device.platform_version.as_deref(), Some("14"));
            assert_eq!(
                settings.source_of("framework.device.udid"),
                Some(Layer::EnvironmentVariable)
            );
            assert_eq!(
                settings.resolved()["framework.device.platform_version"].origin,
                dir.path().join("ci.yaml").display().to_string()
            );
        }

        #[test]
        fn test_null_in_environment_file_keeps_base_value() {
            let dir = TempDir::new().unwrap();
            write(dir.path(), "default.yaml", "framework:\n  device:\n    name: base-device\n");
            write(dir.path(), "staging.yaml", "framework:\n  device:\n    name: ~\n");
            let options = LoadOptions::new()
                .with_config_dir(dir.path())
                .with_environment("staging");
            let settings = Settings::load(&options).unwrap();
            assert_eq!(settings.framework().device.name, "base-device");
            assert_eq!(settings.source_of("framework.device.name"), Some(Layer::BaseFile));
        }

        #[test]
        fn test_missing_environment_file_is_fatal() {
            let dir = TempDir::new().unwrap();
            let options = LoadOptions::new()
                .with_config_dir(dir.path())
                .with_environment("nowhere");
            let err = Settings::load(&options).unwrap_err();
            assert!(err.to_string().contains("nowhere"));
        }

        #[test]
        fn test_malformed_base_file_is_fatal() {
            let dir = TempDir::new().unwrap();
            write(dir.path(), "default.yaml", "framework: {platform: [");
            let err = Settings::load(&LoadOptions::new().with_config_dir(dir.path())).unwrap_err();
            assert!(matches!(err, HandsetError::ConfigParse { .. }));
        }
    }

    mod platform_group_tests {
        use super::*;

        #[test]
        fn test_android_group_resolves() {
            let settings = Settings::from_pairs([
                ("android.app.package", "com.example.shop"),
                ("android.app.activity", ".MainActivity"),
                ("android.system_port", "8201"),
            ])
            .unwrap();
            let android = settings.android().unwrap();
            assert_eq!(android.automation_name, "UiAutomator2");
            assert_eq!(android.app_package.as_deref(), Some("com.example.shop"));
            assert_eq!(android.system_port, Some(8201));
        }

        #[test]
        fn test_inactive_platform_is_not_resolved_at_load() {
            // A broken iOS value must not prevent an Android run from loading
            let settings =
                Settings::from_pairs([("framework.platform", "android"), ("ios.use_prebuilt_wda", "nah")])
                    .unwrap();
            assert!(settings.ios().is_err());
        }

        #[test]
        fn test_ios_group_resolves_eagerly_when_active() {
            let err = Settings::from_pairs([("framework.platform", "IOS"), ("ios.use_prebuilt_wda", "nah")])
                .unwrap_err();
            assert!(err.to_string().contains("ios.use_prebuilt_wda"));

            let settings =
                Settings::from_pairs([("framework.platform", "IOS"), ("ios.bundle_id", "com.example.Shop")])
                    .unwrap();
            assert_eq!(settings.platform(), Platform::Ios);
            assert_eq!(settings.ios().unwrap().bundle_id.as_deref(), Some("com.example.Shop"));
        }
    }
}
