//! Capabilities command handler

use crate::{CapabilitiesArgs, Cli, CliError, CliResult};
use handset::{CapabilitySet, Settings};

/// Execute the capabilities command
pub fn execute_capabilities(cli: &Cli, args: &CapabilitiesArgs) -> CliResult<()> {
    let overrides = super::platform_override(args.platform.as_deref());
    let settings = super::load_settings(cli, &overrides)?;
    println!("{}", render_capabilities(&settings)?);
    Ok(())
}

/// W3C `capabilities` payload for the active platform, pretty-printed
pub fn render_capabilities(settings: &Settings) -> CliResult<String> {
    let set = CapabilitySet::for_platform(settings, settings.platform())?;
    serde_json::to_string_pretty(&set.to_w3c_payload()).map_err(CliError::render)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_android_payload() {
        let settings = Settings::from_pairs([
            ("android.app.path", "/nonexistent/app.apk"),
            ("android.app.package", "com.example.shop"),
            ("android.app.activity", ".MainActivity"),
        ])
        .unwrap();
        let out = render_capabilities(&settings).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        let always = &value["capabilities"]["alwaysMatch"];
        assert_eq!(always["platformName"], "Android");
        assert_eq!(always["appium:appPackage"], "com.example.shop");
    }

    #[test]
    fn test_ios_without_identity_fails() {
        let settings = Settings::from_pairs([
            ("framework.platform", "ios"),
            ("ios.app.path", "/nonexistent/app.app"),
        ])
        .unwrap();
        assert!(render_capabilities(&settings).is_err());
    }
}
