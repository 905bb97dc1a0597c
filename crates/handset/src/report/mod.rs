//! Reporting back-ends
//!
//! The orchestrator publishes lifecycle events to a [`Reporting`] fan-out,
//! which forwards them to every enabled [`ReportSink`].
//!
//! ```text
//! ScenarioOrchestrator
//!        │
//!        ▼
//!   Reporting ──► AllureSink      <output>/allure-results/*.json
//!        ├──────► HtmlReportSink  <output>/reports/report.{html,json}
//!        └──────► MemorySink      (tests)
//! ```
//!
//! Only `suite_started` failures propagate. Every other sink failure is
//! logged and the remaining sinks still receive the event.

mod allure;
mod html;
mod memory;

pub use allure::AllureSink;
pub use html::HtmlReportSink;
pub use memory::{MemorySink, ReportEvent};

use crate::artifacts::ArtifactStore;
use crate::config::Settings;
use crate::hooks::{ScenarioInfo, ScenarioStatus};
use crate::registry::ContextId;
use crate::result::HandsetResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run metadata published once per suite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentInfo {
    entries: BTreeMap<String, String>,
}

impl EnvironmentInfo {
    /// Empty environment table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment table describing a run with `settings`
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let framework = settings.framework();
        let mut info = Self::new();
        info.insert("Platform", settings.platform().capability_name());
        info.insert("Appium.URL", &framework.appium_url);
        info.insert("Device", &framework.device.name);
        if let Some(version) = &framework.device.platform_version {
            info.insert("Platform.Version", version);
        }
        info.insert("Environment", settings.environment().unwrap_or("default"));
        info.insert("Suite", &framework.report.suite_name);
        info.insert("OS", std::env::consts::OS);
        info.insert("Handset.Version", env!("CARGO_PKG_VERSION"));
        info
    }

    /// Add or replace an entry
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.entries.insert(key.into(), value.into());
    }

    /// Entry value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One reported step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step name
    pub name: String,
    /// Step status
    pub status: ScenarioStatus,
    /// Failure detail
    pub message: Option<String>,
    /// Wall-clock start
    pub started: DateTime<Utc>,
    /// Wall-clock stop
    pub stopped: DateTime<Utc>,
}

impl StepRecord {
    /// Step that started and stopped now
    #[must_use]
    pub fn instant(name: impl Into<String>, status: ScenarioStatus, message: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            status,
            message,
            started: now,
            stopped: now,
        }
    }
}

/// A file attached to the running scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Caption
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// File on disk
    pub path: PathBuf,
}

impl Attachment {
    /// PNG screenshot
    #[must_use]
    pub fn png(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            mime_type: "image/png".to_string(),
            path: path.into(),
        }
    }

    /// MP4 recording
    #[must_use]
    pub fn mp4(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            mime_type: "video/mp4".to_string(),
            path: path.into(),
        }
    }

    /// File extension, from the path or else the MIME subtype
    #[must_use]
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .or_else(|| self.mime_type.rsplit('/').next().map(str::to_string))
            .unwrap_or_else(|| "bin".to_string())
    }
}

/// Everything known about a finished scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    /// Display name
    pub name: String,
    /// Final status
    pub status: ScenarioStatus,
    /// Failure or skip reason
    pub message: Option<String>,
    /// Tags without `@`
    pub tags: Vec<String>,
    /// Source location
    pub location: Option<String>,
    /// Execution context
    pub context: String,
    /// Platform name reported by the device
    pub platform: Option<String>,
    /// Device name reported by the device
    pub device: Option<String>,
    /// Wall-clock start
    pub started: DateTime<Utc>,
    /// Elapsed time
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// Screenshots taken
    pub screenshots: Vec<PathBuf>,
    /// Retained recording
    pub video: Option<PathBuf>,
}

impl ScenarioSummary {
    /// Wall-clock stop
    #[must_use]
    pub fn stopped(&self) -> DateTime<Utc> {
        self.started + chrono::Duration::from_std(self.duration).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// A reporting back-end
///
/// Sinks receive events from many execution contexts concurrently and
/// keep per-context state behind their own locks.
pub trait ReportSink: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// The suite started
    fn suite_started(&self, environment: &EnvironmentInfo) -> HandsetResult<()>;

    /// A scenario started in `context`
    fn scenario_started(&self, context: &ContextId, info: &ScenarioInfo) -> HandsetResult<()>;

    /// A step of the running scenario finished
    fn step(&self, context: &ContextId, step: StepRecord) -> HandsetResult<()>;

    /// A file was produced for the running scenario
    fn attach(&self, context: &ContextId, attachment: &Attachment) -> HandsetResult<()>;

    /// The scenario in `context` finished
    fn scenario_finished(&self, context: &ContextId, summary: &ScenarioSummary) -> HandsetResult<()>;

    /// The suite finished; returns where the report was written
    fn suite_finished(&self) -> HandsetResult<Option<PathBuf>>;
}

/// Fan-out over the enabled sinks
#[derive(Default)]
pub struct Reporting {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl std::fmt::Debug for Reporting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporting")
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Reporting {
    /// No sinks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sinks enabled by `framework.report.*`
    #[must_use]
    pub fn from_settings(settings: &Settings, store: &ArtifactStore) -> Self {
        let report = &settings.framework().report;
        let mut reporting = Self::new();
        if report.allure_enabled {
            reporting.push(Box::new(AllureSink::new(
                store.allure_results_dir(),
                &report.suite_name,
            )));
        }
        if report.html_enabled {
            reporting.push(Box::new(HtmlReportSink::new(
                store.reports_dir(),
                &report.suite_name,
            )));
        }
        reporting
    }

    /// Add a sink
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn ReportSink>) -> Self {
        self.push(sink);
        self
    }

    /// Add a sink
    pub fn push(&mut self, sink: Box<dyn ReportSink>) {
        self.sinks.push(sink);
    }

    /// Names of the registered sinks
    #[must_use]
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Number of sinks
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sinks are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Start every sink; the first failure aborts
    pub fn suite_started(&self, environment: &EnvironmentInfo) -> HandsetResult<()> {
        for sink in &self.sinks {
            sink.suite_started(environment)?;
        }
        Ok(())
    }

    /// Publish a scenario start
    pub fn scenario_started(&self, context: &ContextId, info: &ScenarioInfo) {
        self.each("scenario_started", |sink| sink.scenario_started(context, info));
    }

    /// Publish a step
    pub fn step(&self, context: &ContextId, step: &StepRecord) {
        self.each("step", |sink| sink.step(context, step.clone()));
    }

    /// Publish an attachment
    pub fn attach(&self, context: &ContextId, attachment: &Attachment) {
        self.each("attach", |sink| sink.attach(context, attachment));
    }

    /// Publish a scenario summary
    pub fn scenario_finished(&self, context: &ContextId, summary: &ScenarioSummary) {
        self.each("scenario_finished", |sink| sink.scenario_finished(context, summary));
    }

    /// Finish every sink and collect report locations
    pub fn suite_finished(&self) -> Vec<PathBuf> {
        let mut locations = Vec::new();
        for sink in &self.sinks {
            match sink.suite_finished() {
                Ok(Some(path)) => locations.push(path),
                Ok(None) => {}
                Err(e) => tracing::error!(sink = sink.name(), error = %e, "report sink failed at suite end"),
            }
        }
        locations
    }

    fn each(&self, event: &str, mut f: impl FnMut(&dyn ReportSink) -> HandsetResult<()>) {
        for sink in &self.sinks {
            if let Err(e) = f(sink.as_ref()) {
                tracing::warn!(sink = sink.name(), event, error = %e, "report sink failed");
            }
        }
    }
}

/// Write `contents` to `path`, creating parent directories
pub(crate) fn write_report_file(path: &Path, contents: &[u8]) -> HandsetResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}
