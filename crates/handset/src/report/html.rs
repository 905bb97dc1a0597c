//! Self-contained HTML and JSON run summary.

use super::{write_report_file, Attachment, EnvironmentInfo, ReportSink, ScenarioSummary, StepRecord};
use crate::hooks::{ScenarioInfo, ScenarioStatus};
use crate::registry::ContextId;
use crate::result::HandsetResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct HtmlState {
    environment: EnvironmentInfo,
    started: Option<(DateTime<Utc>, Instant)>,
    rows: Vec<ScenarioSummary>,
}

/// Counts and rows written to `report.json`
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    /// Suite name
    pub suite: String,
    /// Wall-clock suite start
    pub started: Option<DateTime<Utc>>,
    /// Suite duration in milliseconds
    pub duration_ms: u64,
    /// Passed scenarios
    pub passed: usize,
    /// Failed scenarios
    pub failed: usize,
    /// Skipped scenarios
    pub skipped: usize,
    /// Passed / (passed + failed), 1.0 when nothing ran
    pub pass_rate: f64,
    /// Environment table
    pub environment: EnvironmentInfo,
    /// One row per scenario, in finish order
    pub scenarios: Vec<ScenarioSummary>,
}

impl ReportDocument {
    /// Total scenarios
    #[must_use]
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

/// Collects scenario summaries and renders them at suite end
#[derive(Debug)]
pub struct HtmlReportSink {
    reports_dir: PathBuf,
    suite_name: String,
    state: Mutex<HtmlState>,
}

impl HtmlReportSink {
    /// Sink writing into `reports_dir`
    #[must_use]
    pub fn new(reports_dir: impl Into<PathBuf>, suite_name: &str) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            suite_name: suite_name.to_string(),
            state: Mutex::new(HtmlState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, HtmlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the collected results
    #[must_use]
    pub fn document(&self) -> ReportDocument {
        let state = self.state();
        let count = |status: ScenarioStatus| state.rows.iter().filter(|r| r.status == status).count();
        let (passed, failed, skipped) = (
            count(ScenarioStatus::Passed),
            count(ScenarioStatus::Failed),
            count(ScenarioStatus::Skipped),
        );
        let pass_rate = if passed + failed == 0 {
            1.0
        } else {
            passed as f64 / (passed + failed) as f64
        };
        let duration = state
            .started
            .map_or(Duration::ZERO, |(_, at)| at.elapsed());

        ReportDocument {
            suite: self.suite_name.clone(),
            started: state.started.map(|(wall, _)| wall),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            passed,
            failed,
            skipped,
            pass_rate,
            environment: state.environment.clone(),
            scenarios: state.rows.clone(),
        }
    }

    /// Render the collected results as an HTML page
    #[must_use]
    pub fn render_html(&self) -> String {
        render_html(&self.document())
    }
}

/// Render a report document as an HTML page
#[must_use]
pub fn render_html(doc: &ReportDocument) -> String {
    let mut html = String::new();

    html.push_str(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
"#,
    );
    let _ = writeln!(html, "    <title>{} - Handset Report</title>", escape_html(&doc.suite));
    html.push_str(
        r#"    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }
        .summary { background: #f5f5f5; padding: 20px; border-radius: 8px; margin-bottom: 20px; }
        .progress-bar { background: #ddd; height: 20px; border-radius: 10px; overflow: hidden; }
        .passed { background: #4caf50; height: 100%; }
        table { border-collapse: collapse; margin-bottom: 20px; }
        td, th { border: 1px solid #ddd; padding: 4px 10px; text-align: left; }
        .scenario { padding: 10px; margin: 5px 0; border-radius: 4px; }
        .scenario.pass { background: #e8f5e9; border-left: 4px solid #4caf50; }
        .scenario.fail { background: #ffebee; border-left: 4px solid #f44336; }
        .scenario.skip { background: #fff3e0; border-left: 4px solid #ff9800; }
        .tag { color: #555; font-size: 0.9em; margin-right: 6px; }
        .error { color: #d32f2f; font-family: monospace; white-space: pre-wrap; }
    </style>
</head>
<body>
"#,
    );

    let _ = write!(
        html,
        r#"<div class="summary">
    <h1>{}</h1>
    <h2>Results: {}/{} passed ({:.1}%), {} failed, {} skipped</h2>
    <div class="progress-bar">
        <div class="passed" style="width: {:.1}%"></div>
    </div>
    <p>Duration: {:.2}s</p>
</div>
"#,
        escape_html(&doc.suite),
        doc.passed,
        doc.total(),
        doc.pass_rate * 100.0,
        doc.failed,
        doc.skipped,
        doc.pass_rate * 100.0,
        Duration::from_millis(doc.duration_ms).as_secs_f64()
    );

    if !doc.environment.is_empty() {
        html.push_str("<h2>Environment</h2>\n<table>\n");
        for (key, value) in doc.environment.iter() {
            let _ = writeln!(
                html,
                "    <tr><th>{}</th><td>{}</td></tr>",
                escape_html(key),
                escape_html(value)
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("<h2>Scenarios</h2>\n");
    for row in &doc.scenarios {
        let class = match row.status {
            ScenarioStatus::Passed => "pass",
            ScenarioStatus::Failed => "fail",
            ScenarioStatus::Skipped => "skip",
        };
        let _ = writeln!(
            html,
            r#"<div class="scenario {}">
    <strong>{}</strong> - {} ({:.2}s) on {}"#,
            class,
            escape_html(&row.name),
            row.status,
            row.duration.as_secs_f64(),
            escape_html(row.device.as_deref().unwrap_or("unknown device"))
        );
        if !row.tags.is_empty() {
            html.push_str("    <div>");
            for tag in &row.tags {
                let _ = write!(html, r#"<span class="tag">@{}</span>"#, escape_html(tag));
            }
            html.push_str("</div>\n");
        }
        if let Some(message) = &row.message {
            let _ = writeln!(html, r#"    <div class="error">{}</div>"#, escape_html(message));
        }
        if let Some(video) = &row.video {
            let _ = writeln!(
                html,
                r#"    <div>Recording: <code>{}</code></div>"#,
                escape_html(&video.display().to_string())
            );
        }
        html.push_str("</div>\n");
    }

    html.push_str(
        r#"
<footer>
    <p>Generated by Handset</p>
</footer>
</body>
</html>
"#,
    );

    html
}

/// Escape HTML special characters
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

impl ReportSink for HtmlReportSink {
    fn name(&self) -> &'static str {
        "html"
    }

    fn suite_started(&self, environment: &EnvironmentInfo) -> HandsetResult<()> {
        std::fs::create_dir_all(&self.reports_dir)?;
        let mut state = self.state();
        state.environment = environment.clone();
        state.started = Some((Utc::now(), Instant::now()));
        state.rows.clear();
        Ok(())
    }

    fn scenario_started(&self, _context: &ContextId, _info: &ScenarioInfo) -> HandsetResult<()> {
        Ok(())
    }

    fn step(&self, _context: &ContextId, _step: StepRecord) -> HandsetResult<()> {
        Ok(())
    }

    fn attach(&self, _context: &ContextId, _attachment: &Attachment) -> HandsetResult<()> {
        Ok(())
    }

    fn scenario_finished(&self, _context: &ContextId, summary: &ScenarioSummary) -> HandsetResult<()> {
        self.state().rows.push(summary.clone());
        Ok(())
    }

    fn suite_finished(&self) -> HandsetResult<Option<PathBuf>> {
        let doc = self.document();
        let html_path = self.reports_dir.join("report.html");
        write_report_file(&html_path, render_html(&doc).as_bytes())?;
        write_report_file(
            &self.reports_dir.join("report.json"),
            &serde_json::to_vec_pretty(&doc)?,
        )?;
        tracing::info!(
            path = %html_path.display(),
            passed = doc.passed,
            failed = doc.failed,
            skipped = doc.skipped,
            "html report written"
        );
        Ok(Some(html_path))
    }
}
