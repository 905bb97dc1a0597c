use super::{LifecycleHooks, ScenarioContext, ScenarioInfo, ScenarioOutcome, ScenarioStatus};
use crate::artifacts::ArtifactStore;
use crate::config::Settings;
use crate::manager::DriverManager;
use crate::registry::ContextId;
use crate::report::{Attachment, EnvironmentInfo, Reporting, ScenarioSummary, StepRecord};
use crate::result::{HandsetError, HandsetResult};
use crate::session::{SessionConnector, SessionHandle};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
struct ActiveScenario {
    info: ScenarioInfo,
    context: ScenarioContext,
    screenshots: Vec<PathBuf>,
}

/// Drives session, artifact and report work around each scenario
#[derive(Debug)]
pub struct ScenarioOrchestrator {
    settings: Arc<Settings>,
    manager: Arc<DriverManager>,
    store: ArtifactStore,
    reporting: Reporting,
    scenarios: Mutex<HashMap<ContextId, ActiveScenario>>,
}

/// Releases a context's session and scenario state when dropped
struct TeardownGuard<'a> {
    orchestrator: &'a ScenarioOrchestrator,
    context: &'a ContextId,
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.manager.destroy_handle(self.context);
        let _ = self.orchestrator.scenarios().remove(self.context);
    }
}

impl ScenarioOrchestrator {
    /// Create an orchestrator
    #[must_use]
    pub fn new(
        settings: Arc<Settings>,
        manager: Arc<DriverManager>,
        store: ArtifactStore,
        reporting: Reporting,
    ) -> Self {
        Self {
            settings,
            manager,
            store,
            reporting,
            scenarios: Mutex::new(HashMap::new()),
        }
    }

    /// Orchestrator with the output directory and report sinks from `settings`
    #[must_use]
    pub fn from_settings(settings: Arc<Settings>, connector: Arc<dyn SessionConnector>) -> Self {
        let store = ArtifactStore::new(&settings.framework().output_dir);
        let reporting = Reporting::from_settings(&settings, &store);
        let manager = Arc::new(DriverManager::new(Arc::clone(&settings), connector));
        Self::new(settings, manager, store, reporting)
    }

    /// Handle manager, for step code
    #[must_use]
    pub fn manager(&self) -> &Arc<DriverManager> {
        &self.manager
    }

    /// Artifact store
    #[must_use]
    pub const fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Settings
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Scenarios between their start and end hooks
    #[must_use]
    pub fn active_scenarios(&self) -> usize {
        self.scenarios().len()
    }

    fn scenarios(&self) -> MutexGuard<'_, HashMap<ContextId, ActiveScenario>> {
        self.scenarios.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Prepare directories and start the report sinks
    pub fn start_suite(&self) -> HandsetResult<()> {
        let suite_setup = |stage: &str, e: HandsetError| HandsetError::SuiteSetup {
            message: format!("{stage}: {e}"),
        };
        self.store
            .prepare()
            .map_err(|e| suite_setup("preparing output directories", e))?;
        let environment = EnvironmentInfo::from_settings(&self.settings);
        self.reporting
            .suite_started(&environment)
            .map_err(|e| suite_setup("starting report sinks", e))?;

        tracing::info!(
            platform = %self.settings.platform(),
            output = %self.store.root().display(),
            sinks = ?self.reporting.sink_names(),
            "suite started"
        );
        Ok(())
    }

    /// Finish the report sinks and purge expired artifacts
    ///
    /// Returns where reports were written. Failures are logged.
    pub fn finish_suite(&self) -> Vec<PathBuf> {
        let locations = self.reporting.suite_finished();

        let retention = self.settings.framework().retention;
        if let Err(e) = self.store.purge_older_than(retention) {
            tracing::warn!(error = %e, "artifact retention purge failed");
        }

        let leaked = self.manager.active_contexts();
        if leaked > 0 {
            tracing::warn!(contexts = leaked, "sessions still open at suite end");
        }
        for location in &locations {
            tracing::info!(path = %location.display(), "report available");
        }
        locations
    }

    fn setup(&self, context: &ContextId, info: &ScenarioInfo) -> HandsetResult<()> {
        let framework = self.settings.framework();
        let handle = self.manager.create_handle_for(context, framework.platform)?;

        if framework.video.enabled {
            match handle.start_recording(Duration::from_secs(framework.video.time_limit_secs)) {
                Ok(()) => self.update(context, |s| s.context.recording = true),
                Err(e) => tracing::warn!(%context, error = %e, "screen recording not started"),
            }
        }
        if framework.screenshots.on_start {
            let _ = self.capture(context, &handle, "start", "Start screenshot");
        }

        tracing::info!(
            %context,
            scenario = %info.name,
            tags = ?info.tags,
            location = info.location.as_deref().unwrap_or("unknown"),
            platform = %handle.platform_name(),
            device = %handle.device_name(),
            session = handle.session_id(),
            "scenario started"
        );
        Ok(())
    }

    fn update(&self, context: &ContextId, f: impl FnOnce(&mut ActiveScenario)) {
        if let Some(scenario) = self.scenarios().get_mut(context) {
            f(scenario);
        }
    }

    /// Screenshot, save and attach; failures are warnings
    fn capture(
        &self,
        context: &ContextId,
        handle: &SessionHandle,
        label: &str,
        caption: &str,
    ) -> Option<PathBuf> {
        let name = self
            .scenarios()
            .get(context)
            .map(|s| s.context.artifact_name.clone())?;

        let saved = handle
            .screenshot()
            .and_then(|png| self.store.save_screenshot(&name, label, &png));
        match saved {
            Ok(path) => {
                self.reporting.attach(context, &Attachment::png(caption, &path));
                self.update(context, |s| s.screenshots.push(path.clone()));
                tracing::debug!(%context, path = %path.display(), label, "screenshot saved");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(%context, label, error = %e, "screenshot not captured");
                None
            }
        }
    }

    /// Stop the recording and keep or drop it by status
    fn finish_recording(
        &self,
        context: &ContextId,
        handle: &SessionHandle,
        scenario: &ActiveScenario,
        status: ScenarioStatus,
    ) -> HandsetResult<Option<PathBuf>> {
        if !scenario.context.recording {
            return Ok(None);
        }
        let video = handle.stop_recording()?;

        if status.is_passed() && self.settings.framework().video.delete_on_pass {
            tracing::debug!(%context, "recording discarded for passed scenario");
            return Ok(None);
        }

        let path = self.store.save_video(&scenario.context.artifact_name, &video)?;
        self.reporting
            .attach(context, &Attachment::mp4("Screen recording", &path));
        tracing::info!(%context, path = %path.display(), %status, "recording retained");
        Ok(Some(path))
    }

    /// Run one teardown step, logging errors and panics
    fn isolated(&self, context: &ContextId, step: &str, f: impl FnOnce() -> HandsetResult<()>) {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(%context, step, error = %e, "teardown step failed"),
            Err(payload) => tracing::error!(
                %context,
                step,
                panic = %panic_message(payload.as_ref()),
                "teardown step panicked"
            ),
        }
    }

    fn teardown(&self, context: &ContextId, outcome: &ScenarioOutcome) {
        let Some(scenario) = self.scenarios().get(context).cloned() else {
            tracing::warn!(%context, "scenario end without a matching start");
            return;
        };
        let handle = self.manager.get_handle(context).ok();
        let duration = scenario.context.started_at.elapsed();
        let status = outcome.status;
        let policy = self.settings.framework().screenshots;
        let name = scenario.context.display_name.as_str();

        self.isolated(context, "status screenshot", || {
            match status {
                ScenarioStatus::Passed => {
                    tracing::info!(%context, scenario = name, "scenario passed");
                    if policy.on_pass {
                        if let Some(handle) = &handle {
                            let _ = self.capture(context, handle, "passed", "Pass screenshot");
                        }
                    }
                }
                ScenarioStatus::Failed => {
                    tracing::error!(
                        %context,
                        scenario = name,
                        reason = outcome.message.as_deref().unwrap_or("unknown"),
                        "scenario failed"
                    );
                    if policy.on_failure {
                        if let Some(handle) = &handle {
                            let _ = self.capture(context, handle, "failed", "Failure screenshot");
                        }
                    }
                }
                ScenarioStatus::Skipped => tracing::info!(
                    %context,
                    scenario = name,
                    reason = outcome.message.as_deref().unwrap_or("none"),
                    duration_ms = duration.as_millis() as u64,
                    "scenario skipped"
                ),
            }
            Ok(())
        });

        let mut video = None;
        self.isolated(context, "recording", || {
            if let Some(handle) = &handle {
                video = self.finish_recording(context, handle, &scenario, status)?;
            }
            Ok(())
        });

        self.isolated(context, "final screenshot", || {
            if policy.on_end {
                if let Some(handle) = &handle {
                    let label = format!("end_{status}");
                    let _ = self.capture(context, handle, &label, "Final screenshot");
                }
            }
            Ok(())
        });

        self.isolated(context, "summary", || {
            let screenshots = self
                .scenarios()
                .get(context)
                .map_or_else(Vec::new, |s| s.screenshots.clone());
            let summary = ScenarioSummary {
                name: scenario.info.name.clone(),
                status,
                message: outcome.message.clone(),
                tags: scenario.info.tags.clone(),
                location: scenario.info.location.clone(),
                context: context.to_string(),
                platform: handle.as_ref().map(|h| h.platform_name()),
                device: handle.as_ref().map(|h| h.device_name()),
                started: scenario.context.started_wall,
                duration,
                screenshots,
                video: video.clone(),
            };
            self.reporting.scenario_finished(context, &summary);
            Ok(())
        });

        tracing::info!(
            %context,
            scenario = name,
            %status,
            duration_ms = duration.as_millis() as u64,
            recording = ?video,
            "scenario finished"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

impl LifecycleHooks for ScenarioOrchestrator {
    fn on_suite_start(&self) -> HandsetResult<()> {
        self.start_suite()
    }

    fn on_scenario_start(&self, context: &ContextId, info: &ScenarioInfo) -> HandsetResult<()> {
        let scenario = ActiveScenario {
            info: info.clone(),
            context: ScenarioContext::new(info),
            screenshots: Vec::new(),
        };
        if self.scenarios().insert(context.clone(), scenario).is_some() {
            tracing::warn!(%context, "previous scenario in this context never finished");
        }
        self.reporting.scenario_started(context, info);

        match self.setup(context, info) {
            Ok(()) => {
                self.reporting.step(
                    context,
                    &StepRecord::instant("Scenario setup", ScenarioStatus::Passed, None),
                );
                Ok(())
            }
            Err(e) => {
                if let Ok(handle) = self.manager.get_handle(context) {
                    let _ = self.capture(context, &handle, "setup_failure", "Setup failure screenshot");
                }
                self.reporting.step(
                    context,
                    &StepRecord::instant("Scenario setup", ScenarioStatus::Failed, Some(e.to_string())),
                );
                tracing::error!(%context, scenario = %info.name, error = %e, "scenario setup failed");
                Err(HandsetError::SetupFailed {
                    scenario: info.name.clone(),
                    source: Box::new(e),
                })
            }
        }
    }

    fn on_scenario_end(&self, context: &ContextId, outcome: &ScenarioOutcome) {
        let _guard = TeardownGuard {
            orchestrator: self,
            context,
        };
        self.teardown(context, outcome);
    }

    fn on_suite_end(&self) {
        let _ = self.finish_suite();
    }
}
