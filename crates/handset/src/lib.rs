//! Handset: Appium session lifecycle for mobile BDD suites
//!
//! Handset owns everything around a mobile UI scenario except the steps
//! themselves: layered configuration, one Appium session per execution
//! context, screenshots and screen recordings, and Allure / HTML reports.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      HANDSET Architecture                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  BDD engine ──► ScenarioOrchestrator ──► DriverManager           │
//! │  (cucumber)       │        │               │                     │
//! │                   │        │               ▼                     │
//! │                   │        │         SessionRegistry             │
//! │                   │        │     ContextId → SessionHandle       │
//! │                   ▼        ▼               │                     │
//! │           ArtifactStore  Reporting         ▼                     │
//! │           png / mp4      Allure, HTML   Appium (W3C WebDriver)   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use handset::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> HandsetResult<()> {
//! let settings = Arc::new(Settings::load(&LoadOptions::new().with_config_dir("config"))?);
//! let orchestrator =
//!     ScenarioOrchestrator::from_settings(settings, Arc::new(WebDriverConnector::new()?));
//!
//! orchestrator.on_suite_start()?;
//! let ctx = ContextId::current_thread();
//! orchestrator.on_scenario_start(&ctx, &ScenarioInfo::new("Login").with_tags(["@smoke"]))?;
//! // ... drive the app through orchestrator.manager().get_handle(&ctx)
//! orchestrator.on_scenario_end(&ctx, &ScenarioOutcome::passed());
//! orchestrator.on_suite_end();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod artifacts;
#[cfg(feature = "cucumber")]
pub mod bdd;
mod capabilities;
pub mod config;
pub mod hooks;
pub mod logging;
mod manager;
mod platform;
mod registry;
pub mod report;
mod result;
pub mod session;

pub use artifacts::{sanitize_name, ArtifactStore};
pub use capabilities::CapabilitySet;
pub use config::{LoadOptions, Settings};
pub use hooks::{
    LifecycleHooks, ScenarioContext, ScenarioInfo, ScenarioOrchestrator, ScenarioOutcome,
    ScenarioStatus,
};
pub use logging::LogFormat;
pub use manager::{parse_endpoint, DriverManager};
pub use platform::Platform;
pub use registry::{ContextId, SessionRegistry};
pub use report::{
    AllureSink, Attachment, EnvironmentInfo, HtmlReportSink, MemorySink, ReportSink, Reporting,
    ScenarioSummary, StepRecord,
};
pub use result::{HandsetError, HandsetResult};
pub use session::{
    server_status, DeviceSession, MockConnector, MockDevice, MockFailures, SessionConnector,
    SessionHandle, WebDriverConnector,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::hooks::{
        LifecycleHooks, ScenarioInfo, ScenarioOrchestrator, ScenarioOutcome, ScenarioStatus,
    };
    pub use super::{
        ArtifactStore, CapabilitySet, ContextId, DriverManager, HandsetError, HandsetResult,
        LoadOptions, Platform, Reporting, SessionHandle, Settings, WebDriverConnector,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_tests {
        use super::*;

        #[test]
        fn test_not_initialized_display() {
            let err = HandsetError::not_initialized("worker-3");
            assert!(err.to_string().contains("worker-3"));
            assert!(err.is_not_initialized());
        }

        #[test]
        fn test_setup_failed_keeps_source() {
            let err = HandsetError::SetupFailed {
                scenario: "Login".to_string(),
                source: Box::new(HandsetError::UnsupportedPlatform {
                    value: "windows".to_string(),
                }),
            };
            let msg = err.to_string();
            assert!(msg.contains("Login"));
            assert!(msg.contains("windows"));
        }
    }

    mod prelude_tests {
        use super::prelude::*;

        #[test]
        fn test_prelude_exposes_core_types() {
            let info = ScenarioInfo::new("x");
            assert_eq!(info.name, "x");
            assert_eq!("ios".parse::<Platform>().ok(), Some(Platform::Ios));
        }
    }
}
