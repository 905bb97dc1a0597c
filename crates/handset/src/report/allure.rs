//! Allure results writer.
//!
//! Produces the file set the Allure CLI consumes:
//!
//! ```text
//! allure-results/
//!   environment.properties
//!   <uuid>-result.json
//!   <uuid>-attachment.<ext>
//! ```

use super::{write_report_file, Attachment, EnvironmentInfo, ReportSink, ScenarioSummary, StepRecord};
use crate::hooks::{ScenarioInfo, ScenarioStatus};
use crate::registry::ContextId;
use crate::result::{HandsetError, HandsetResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
struct Label {
    name: String,
    value: String,
}

impl Label {
    fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AllureAttachment {
    name: String,
    source: String,
    #[serde(rename = "type")]
    mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AllureStep {
    name: String,
    status: ScenarioStatus,
    stage: &'static str,
    start: i64,
    stop: i64,
    status_details: StatusDetails,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AllureResult {
    uuid: String,
    history_id: String,
    name: String,
    full_name: String,
    status: &'static str,
    status_details: StatusDetails,
    stage: &'static str,
    start: i64,
    stop: i64,
    labels: Vec<Label>,
    steps: Vec<AllureStep>,
    attachments: Vec<AllureAttachment>,
}

#[derive(Debug, Default)]
struct AllureState {
    running: HashMap<ContextId, AllureResult>,
    written: usize,
}

/// Writes Allure result files
#[derive(Debug)]
pub struct AllureSink {
    results_dir: PathBuf,
    suite_name: String,
    host: String,
    state: Mutex<AllureState>,
}

impl AllureSink {
    /// Sink writing into `results_dir`
    #[must_use]
    pub fn new(results_dir: impl Into<PathBuf>, suite_name: &str) -> Self {
        Self {
            results_dir: results_dir.into(),
            suite_name: suite_name.to_string(),
            host: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
            state: Mutex::new(AllureState::default()),
        }
    }

    /// Results directory
    #[must_use]
    pub fn results_dir(&self) -> &std::path::Path {
        &self.results_dir
    }

    fn state(&self) -> MutexGuard<'_, AllureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_running<T>(
        &self,
        context: &ContextId,
        f: impl FnOnce(&mut AllureResult) -> HandsetResult<T>,
    ) -> HandsetResult<T> {
        let mut state = self.state();
        let result = state
            .running
            .get_mut(context)
            .ok_or_else(|| not_running(context))?;
        f(result)
    }

    fn write_result(&self, result: &AllureResult) -> HandsetResult<PathBuf> {
        let path = self.results_dir.join(format!("{}-result.json", result.uuid));
        write_report_file(&path, &serde_json::to_vec_pretty(result)?)?;
        Ok(path)
    }
}

fn epoch_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// `key=value` lines with Java properties escaping
fn render_properties(environment: &EnvironmentInfo) -> String {
    fn escape(s: &str, is_key: bool) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '=' | ':' | ' ' if is_key => {
                    out.push('\\');
                    out.push(c);
                }
                _ => out.push(c),
            }
        }
        out
    }

    environment
        .iter()
        .map(|(k, v)| format!("{}={}\n", escape(k, true), escape(v, false)))
        .collect()
}

impl ReportSink for AllureSink {
    fn name(&self) -> &'static str {
        "allure"
    }

    fn suite_started(&self, environment: &EnvironmentInfo) -> HandsetResult<()> {
        std::fs::create_dir_all(&self.results_dir)?;
        let path = self.results_dir.join("environment.properties");
        write_report_file(&path, render_properties(environment).as_bytes())?;
        tracing::debug!(path = %path.display(), "allure environment written");
        Ok(())
    }

    fn scenario_started(&self, context: &ContextId, info: &ScenarioInfo) -> HandsetResult<()> {
        let full_name = info.full_name();
        let now = epoch_ms(Utc::now());
        let mut labels: Vec<Label> = info.tags.iter().map(|t| Label::new("tag", t)).collect();
        if let Some(feature) = info.feature() {
            labels.push(Label::new("feature", feature));
        }
        labels.push(Label::new("suite", &self.suite_name));
        labels.push(Label::new("thread", context.as_str()));
        labels.push(Label::new("host", &self.host));
        labels.push(Label::new("framework", "handset"));
        labels.push(Label::new("language", "rust"));

        let result = AllureResult {
            uuid: Uuid::new_v4().to_string(),
            history_id: Uuid::new_v5(&Uuid::NAMESPACE_OID, full_name.as_bytes()).to_string(),
            name: info.name.clone(),
            full_name,
            status: "unknown",
            status_details: StatusDetails::default(),
            stage: "running",
            start: now,
            stop: now,
            labels,
            steps: Vec::new(),
            attachments: Vec::new(),
        };
        if let Some(stale) = self.state().running.insert(context.clone(), result) {
            tracing::warn!(%context, scenario = %stale.name, "discarding unfinished allure result");
        }
        Ok(())
    }

    fn step(&self, context: &ContextId, step: StepRecord) -> HandsetResult<()> {
        self.with_running(context, |result| {
            result.steps.push(AllureStep {
                name: step.name,
                status: step.status,
                stage: "finished",
                start: epoch_ms(step.started),
                stop: epoch_ms(step.stopped),
                status_details: StatusDetails {
                    message: step.message,
                },
            });
            Ok(())
        })
    }

    fn attach(&self, context: &ContextId, attachment: &Attachment) -> HandsetResult<()> {
        if !self.state().running.contains_key(context) {
            return Err(not_running(context));
        }

        // Copy outside the state lock
        let source = format!("{}-attachment.{}", Uuid::new_v4(), attachment.extension());
        let target = self.results_dir.join(&source);
        std::fs::create_dir_all(&self.results_dir)?;
        let _ = std::fs::copy(&attachment.path, &target)?;

        let recorded = self.with_running(context, |result| {
            result.attachments.push(AllureAttachment {
                name: attachment.name.clone(),
                source,
                mime_type: attachment.mime_type.clone(),
            });
            Ok(())
        });
        if recorded.is_err() {
            let _ = std::fs::remove_file(&target);
        }
        recorded
    }

    fn scenario_finished(&self, context: &ContextId, summary: &ScenarioSummary) -> HandsetResult<()> {
        let mut result = self
            .state()
            .running
            .remove(context)
            .ok_or_else(|| not_running(context))?;
        result.status = summary.status.as_str();
        result.stage = "finished";
        result.start = epoch_ms(summary.started);
        result.stop = epoch_ms(summary.stopped());
        result.status_details.message = summary.message.clone();
        if let Some(platform) = &summary.platform {
            result.labels.push(Label::new("platform", platform));
        }
        if let Some(device) = &summary.device {
            result.labels.push(Label::new("device", device));
        }

        let path = self.write_result(&result)?;
        self.state().written += 1;
        tracing::debug!(path = %path.display(), status = %summary.status, "allure result written");
        Ok(())
    }

    fn suite_finished(&self) -> HandsetResult<Option<PathBuf>> {
        let (orphans, written) = {
            let mut state = self.state();
            let orphans: Vec<AllureResult> = state.running.drain().map(|(_, r)| r).collect();
            (orphans, state.written)
        };
        for mut orphan in orphans {
            tracing::warn!(scenario = %orphan.name, "scenario never finished; reporting as broken");
            orphan.status = "broken";
            orphan.stage = "interrupted";
            orphan.stop = epoch_ms(Utc::now());
            let _ = self.write_result(&orphan)?;
        }
        tracing::info!(results = written, dir = %self.results_dir.display(), "allure results complete");
        Ok(Some(self.results_dir.clone()))
    }
}

fn not_running(context: &ContextId) -> HandsetError {
    HandsetError::report(format!("no running Allure result for context '{context}'"))
}
