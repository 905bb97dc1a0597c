//! Status command handler

use crate::{Cli, CliError, CliResult, Reporter};
use handset::{parse_endpoint, server_status};
use serde_json::Value;

/// What an Appium `/status` response says
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSummary {
    /// Whether the server accepts new sessions
    pub ready: bool,
    /// Server message, if any
    pub message: Option<String>,
    /// Appium build version, if reported
    pub version: Option<String>,
}

/// Execute the status command
pub fn execute_status(cli: &Cli, reporter: &Reporter) -> CliResult<()> {
    let settings = super::load_settings(cli, &[])?;
    let endpoint = parse_endpoint(&settings.framework().appium_url)?;
    reporter.info(&format!("Probing {endpoint}"));

    let summary = summarize_status(&server_status(&endpoint)?);
    let version = summary.version.as_deref().unwrap_or("unknown version");
    if summary.ready {
        reporter.success(&format!("Appium {version} ready at {endpoint}"));
        Ok(())
    } else {
        Err(CliError::ServerNotReady {
            message: summary
                .message
                .unwrap_or_else(|| format!("{endpoint} reported ready=false")),
        })
    }
}

/// Read readiness from a `/status` body
///
/// Accepts both the W3C shape (`{"value": {...}}`) and a bare object.
/// A missing `ready` field counts as ready, matching older servers.
#[must_use]
pub fn summarize_status(body: &Value) -> ServerSummary {
    let value = body.get("value").unwrap_or(body);
    ServerSummary {
        ready: value.get("ready").and_then(Value::as_bool).unwrap_or(true),
        message: value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        version: value
            .pointer("/build/version")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_w3c_ready() {
        let summary = summarize_status(&json!({
            "value": {
                "ready": true,
                "message": "The server is ready to accept new connections",
                "build": { "version": "2.11.3" }
            }
        }));
        assert!(summary.ready);
        assert_eq!(summary.version.as_deref(), Some("2.11.3"));
    }

    #[test]
    fn test_not_ready() {
        let summary = summarize_status(&json!({
            "value": { "ready": false, "message": "busy" }
        }));
        assert!(!summary.ready);
        assert_eq!(summary.message.as_deref(), Some("busy"));
        assert!(summary.version.is_none());
    }

    #[test]
    fn test_bare_body_without_ready() {
        let summary = summarize_status(&json!({ "build": { "version": "1.22.0" } }));
        assert!(summary.ready);
        assert_eq!(summary.version.as_deref(), Some("1.22.0"));
    }
}
