//! Smoke command handler
//!
//! Runs one scenario through the whole lifecycle: suite start, session
//! creation, a reset of the application under test, teardown with artifacts
//! and reports, suite end. With `--dry-run` the session is simulated.

use crate::{Cli, CliError, CliResult, Reporter, SmokeArgs};
use handset::{
    ContextId, LifecycleHooks, MockConnector, ScenarioInfo, ScenarioOrchestrator,
    ScenarioOutcome, ScenarioStatus, SessionConnector, Settings, WebDriverConnector,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a smoke run
#[derive(Debug, Clone)]
pub struct SmokeReport {
    /// Scenario name
    pub scenario: String,
    /// Final status
    pub status: ScenarioStatus,
    /// Failure message
    pub message: Option<String>,
    /// Platform the session reported
    pub platform: Option<String>,
    /// Device the session reported
    pub device: Option<String>,
    /// Report locations written at suite end
    pub reports: Vec<PathBuf>,
    /// Wall time of the run
    pub duration: Duration,
}

/// Execute the smoke command
pub fn execute_smoke(cli: &Cli, args: &SmokeArgs, reporter: &Reporter) -> CliResult<()> {
    let overrides = super::platform_override(args.platform.as_deref());
    let settings = Arc::new(super::load_settings(cli, &overrides)?);
    let connector: Arc<dyn SessionConnector> = if args.dry_run {
        reporter.warning("Dry run: using a simulated device");
        Arc::new(MockConnector::new())
    } else {
        Arc::new(WebDriverConnector::new()?)
    };

    reporter.header(&format!("Smoke: {}", args.name));
    let report = run_smoke(settings, connector, &args.name)?;

    if let (Some(platform), Some(device)) = (&report.platform, &report.device) {
        reporter.info(&format!("Session on {platform} / {device}"));
    }
    for location in &report.reports {
        reporter.info(&format!("Report: {}", location.display()));
    }
    let (passed, failed) = match report.status {
        ScenarioStatus::Passed => (1, 0),
        _ => (0, 1),
    };
    reporter.summary(passed, failed, 0, report.duration);

    if report.status.is_passed() {
        Ok(())
    } else {
        Err(CliError::SmokeFailed {
            message: report
                .message
                .unwrap_or_else(|| report.status.to_string()),
        })
    }
}

/// Drive one scenario through the orchestrator
///
/// Suite-level failures are errors; scenario failures end up in the report.
pub fn run_smoke(
    settings: Arc<Settings>,
    connector: Arc<dyn SessionConnector>,
    name: &str,
) -> CliResult<SmokeReport> {
    let started = Instant::now();
    let orchestrator = ScenarioOrchestrator::from_settings(settings, connector);
    orchestrator.on_suite_start()?;

    let context = ContextId::unique();
    let info = ScenarioInfo::new(name).with_tags(["@smoke"]);
    let mut platform = None;
    let mut device = None;

    let outcome = match orchestrator.on_scenario_start(&context, &info) {
        Ok(()) => {
            let manager = orchestrator.manager();
            let exercised = manager
                .current_platform_name(&context)
                .and_then(|p| {
                    platform = Some(p);
                    manager.current_device_name(&context)
                })
                .and_then(|d| {
                    device = Some(d);
                    manager.reset_application(&context)
                });
            match exercised {
                Ok(()) => ScenarioOutcome::passed(),
                Err(e) => ScenarioOutcome::failed(e.to_string()),
            }
        }
        Err(e) => ScenarioOutcome::failed(e.to_string()),
    };
    orchestrator.on_scenario_end(&context, &outcome);
    let reports = orchestrator.finish_suite();
    tracing::info!(
        scenario = %info.name,
        status = %outcome.status,
        reports = reports.len(),
        "smoke run finished"
    );

    Ok(SmokeReport {
        scenario: info.name,
        status: outcome.status,
        message: outcome.message,
        platform,
        device,
        reports,
        duration: started.elapsed(),
    })
}
