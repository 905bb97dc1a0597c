//! Capability Set
//!
//! The immutable W3C/Appium capability map sent when a session is created.
//! Built once per handle from framework-wide device settings merged with the
//! platform's automation settings.
//!
//! The application binary is optional: when no file exists at the configured
//! path the app is identified by package/activity (Android) or bundle id
//! (iOS) and Appium attaches to the installed build.

use crate::config::{AndroidSettings, IosSettings, Settings};
use crate::platform::Platform;
use crate::result::{HandsetError, HandsetResult};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Immutable capability map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilitySet {
    platform: Platform,
    app_id: String,
    entries: BTreeMap<String, Value>,
}

impl CapabilitySet {
    /// Build the capability set for `platform`
    pub fn for_platform(settings: &Settings, platform: Platform) -> HandsetResult<Self> {
        let mut builder = Builder::new(platform);
        let device = &settings.framework().device;

        builder.set("platformName", platform.capability_name());
        builder.set("appium:deviceName", device.name.as_str());
        if let Some(version) = &device.platform_version {
            builder.set("appium:platformVersion", version.as_str());
        }
        if let Some(udid) = &device.udid {
            builder.set("appium:udid", udid.as_str());
        }
        builder.set("appium:newCommandTimeout", device.new_command_timeout_secs);
        builder.set("appium:noReset", device.no_reset);
        builder.set("appium:fullReset", device.full_reset);

        let app_id = match platform {
            Platform::Android => android(&mut builder, &settings.android()?)?,
            Platform::Ios => ios(&mut builder, &settings.ios()?)?,
        };

        Ok(Self {
            platform,
            app_id,
            entries: builder.entries,
        })
    }

    /// Platform the set was built for
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Package (Android) or bundle id (iOS) of the application under test
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Capability value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Number of capabilities
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over capabilities in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `POST /session` request body
    #[must_use]
    pub fn to_w3c_payload(&self) -> Value {
        json!({
            "capabilities": {
                "alwaysMatch": self.entries,
                "firstMatch": [{}],
            }
        })
    }
}

struct Builder {
    platform: Platform,
    entries: BTreeMap<String, Value>,
}

impl Builder {
    fn new(platform: Platform) -> Self {
        Self {
            platform,
            entries: BTreeMap::new(),
        }
    }

    fn set(&mut self, name: &str, value: impl Into<Value>) {
        let _ = self.entries.insert(name.to_string(), value.into());
    }

    /// Sets `appium:app` when the binary exists; returns whether it did
    fn app_binary(&mut self, path: &Path) -> bool {
        if !path.exists() {
            tracing::warn!(
                platform = %self.platform,
                path = %path.display(),
                "application binary not found, identifying the app by its installed id"
            );
            return false;
        }
        let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.set("appium:app", absolute.display().to_string());
        true
    }
}

fn android(builder: &mut Builder, android: &AndroidSettings) -> HandsetResult<String> {
    builder.set("appium:automationName", android.automation_name.as_str());
    let has_binary = builder.app_binary(&android.app_path);

    if let Some(package) = &android.app_package {
        builder.set("appium:appPackage", package.as_str());
    }
    if let Some(activity) = &android.app_activity {
        builder.set("appium:appActivity", activity.as_str());
    }
    if let Some(wait) = &android.app_wait_activity {
        builder.set("appium:appWaitActivity", wait.as_str());
    }
    // Appium resolves the launch activity from the package when none is given
    if !has_binary && android.app_package.is_none() {
        return Err(HandsetError::config(format!(
            "no application binary at {} and android.app.package is not set",
            android.app_path.display()
        )));
    }

    builder.set("appium:autoGrantPermissions", android.auto_grant_permissions);
    builder.set("appium:disableWindowAnimation", android.disable_window_animation);
    builder.set(
        "appium:ignoreHiddenApiPolicyError",
        android.ignore_hidden_api_policy_error,
    );
    builder.set("appium:adbExecTimeout", android.adb_exec_timeout_ms);
    builder.set(
        "appium:uiautomator2ServerInstallTimeout",
        android.server_install_timeout_ms,
    );
    if let Some(port) = android.system_port {
        builder.set("appium:systemPort", port);
    }

    Ok(android
        .app_package
        .clone()
        .unwrap_or_else(|| file_stem(&android.app_path)))
}

fn ios(builder: &mut Builder, ios: &IosSettings) -> HandsetResult<String> {
    builder.set("appium:automationName", ios.automation_name.as_str());
    let has_binary = builder.app_binary(&ios.app_path);

    if let Some(bundle_id) = &ios.bundle_id {
        builder.set("appium:bundleId", bundle_id.as_str());
    }
    if !has_binary && ios.bundle_id.is_none() {
        return Err(HandsetError::config(format!(
            "no application binary at {} and ios.bundle_id is not set",
            ios.app_path.display()
        )));
    }

    builder.set("appium:autoAcceptAlerts", ios.auto_accept_alerts);
    builder.set("appium:wdaLaunchTimeout", ios.wda_launch_timeout_ms);
    builder.set("appium:usePrebuiltWDA", ios.use_prebuilt_wda);
    if let Some(port) = ios.wda_local_port {
        builder.set("appium:wdaLocalPort", port);
    }

    Ok(ios
        .bundle_id
        .clone()
        .unwrap_or_else(|| file_stem(&ios.app_path)))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn android_settings(extra: &[(&str, &str)]) -> Settings {
        let mut pairs = vec![
            ("android.app.path", "/definitely/not/here.apk"),
            ("android.app.package", "com.example.shop"),
            ("android.app.activity", ".MainActivity"),
        ];
        pairs.extend_from_slice(extra);
        Settings::from_pairs(pairs).unwrap()
    }

    mod android_tests {
        use super::*;

        #[test]
        fn test_missing_binary_falls_back_to_package() {
            let settings = android_settings(&[]);
            let caps = CapabilitySet::for_platform(&settings, Platform::Android).unwrap();

            assert!(caps.get("appium:app").is_none());
            assert_eq!(caps.get("appium:appPackage"), Some(&json!("com.example.shop")));
            assert_eq!(caps.get("appium:appActivity"), Some(&json!(".MainActivity")));
            assert_eq!(caps.get("platformName"), Some(&json!("Android")));
            assert_eq!(caps.get("appium:automationName"), Some(&json!("UiAutomator2")));
            assert_eq!(caps.app_id(), "com.example.shop");
        }

        #[test]
        fn test_existing_binary_is_used() {
            let dir = TempDir::new().unwrap();
            let apk = dir.path().join("shop.apk");
            std::fs::write(&apk, b"apk").unwrap();
            let path = apk.display().to_string();

            let settings = Settings::from_pairs([("android.app.path", path.as_str())]).unwrap();
            let caps = CapabilitySet::for_platform(&settings, Platform::Android).unwrap();

            let app = caps.get("appium:app").and_then(Value::as_str).unwrap();
            assert!(app.ends_with("shop.apk"));
            assert_eq!(caps.app_id(), "shop");
        }

        #[test]
        fn test_package_alone_identifies_app() {
            let settings = Settings::from_pairs([
                ("android.app.path", "/definitely/not/here.apk"),
                ("android.app.package", "com.example.shop"),
            ])
            .unwrap();
            let caps = CapabilitySet::for_platform(&settings, Platform::Android).unwrap();

            assert!(caps.get("appium:app").is_none());
            assert!(caps.get("appium:appActivity").is_none());
            assert_eq!(caps.get("appium:appPackage"), Some(&json!("com.example.shop")));
            assert_eq!(caps.app_id(), "com.example.shop");
        }

        #[test]
        fn test_activity_without_package_is_error() {
            let settings = Settings::from_pairs([
                ("android.app.path", "/nope.apk"),
                ("android.app.activity", ".MainActivity"),
            ])
            .unwrap();
            let err = CapabilitySet::for_platform(&settings, Platform::Android).unwrap_err();
            assert!(err.to_string().contains("android.app.package"));
        }

        #[test]
        fn test_no_binary_and_no_identifier_is_error() {
            let settings = Settings::from_pairs([("android.app.path", "/nope.apk")]).unwrap();
            let err = CapabilitySet::for_platform(&settings, Platform::Android).unwrap_err();
            assert!(err.to_string().contains("android.app.package"));
        }

        #[test]
        fn test_device_settings_are_merged() {
            let settings = android_settings(&[
                ("framework.device.name", "Pixel 8"),
                ("framework.device.platform_version", "14"),
                ("framework.device.no_reset", "true"),
                ("android.system_port", "8210"),
            ]);
            let caps = CapabilitySet::for_platform(&settings, Platform::Android).unwrap();
            assert_eq!(caps.get("appium:deviceName"), Some(&json!("Pixel 8")));
            assert_eq!(caps.get("appium:platformVersion"), Some(&json!("14")));
            assert_eq!(caps.get("appium:noReset"), Some(&json!(true)));
            assert_eq!(caps.get("appium:systemPort"), Some(&json!(8210)));
        }
    }

    mod ios_tests {
        use super::*;

        #[test]
        fn test_bundle_id_fallback() {
            let settings = Settings::from_pairs([
                ("framework.platform", "ios"),
                ("ios.app.path", "/missing/Shop.app"),
                ("ios.bundle_id", "com.example.Shop"),
            ])
            .unwrap();
            let caps = CapabilitySet::for_platform(&settings, Platform::Ios).unwrap();
            assert_eq!(caps.get("platformName"), Some(&json!("iOS")));
            assert_eq!(caps.get("appium:bundleId"), Some(&json!("com.example.Shop")));
            assert_eq!(caps.get("appium:automationName"), Some(&json!("XCUITest")));
            assert!(caps.get("appium:app").is_none());
            assert_eq!(caps.app_id(), "com.example.Shop");
        }

        #[test]
        fn test_ios_without_identity_is_error() {
            let settings =
                Settings::from_pairs([("framework.platform", "ios"), ("ios.app.path", "/missing.app")])
                    .unwrap();
            assert!(CapabilitySet::for_platform(&settings, Platform::Ios).is_err());
        }
    }

    #[test]
    fn test_w3c_payload_shape() {
        let caps = CapabilitySet::for_platform(&android_settings(&[]), Platform::Android).unwrap();
        let payload = caps.to_w3c_payload();
        assert_eq!(
            payload["capabilities"]["alwaysMatch"]["platformName"],
            json!("Android")
        );
        assert!(payload["capabilities"]["firstMatch"].is_array());
        assert_eq!(caps.len(), caps.iter().count());
    }
}
