//! Cucumber integration
//!
//! Wires the orchestrator into `cucumber`'s `before` / `after` hooks:
//!
//! ```ignore
//! let before = Arc::clone(&orchestrator);
//! let after = Arc::clone(&orchestrator);
//! bdd::start_suite(&orchestrator).await?;
//! ShopWorld::cucumber()
//!     .before(move |f, r, s, w| bdd::before_scenario(Arc::clone(&before), f, r, s, w))
//!     .after(move |f, r, s, ev, w| bdd::after_scenario(Arc::clone(&after), f, r, s, ev, w))
//!     .run("tests/features")
//!     .await;
//! bdd::finish_suite(&orchestrator).await;
//! ```
//!
//! Cucumber runs scenarios as futures that may share OS threads, so each
//! world carries its own [`ContextId`] rather than using the thread's.
//! Orchestrator calls block on device I/O and run on tokio's blocking pool.

use crate::hooks::{LifecycleHooks, ScenarioInfo, ScenarioOutcome, ScenarioOrchestrator};
use crate::registry::ContextId;
use crate::result::{HandsetError, HandsetResult};
use cucumber::{event, gherkin};
use futures::future::{FutureExt as _, LocalBoxFuture};
use std::path::PathBuf;
use std::sync::Arc;

/// A cucumber world that owns an execution context
pub trait HasContext {
    /// The world's context (stable for the scenario's lifetime)
    fn context(&self) -> &ContextId;
}

/// Scenario metadata as the orchestrator sees it
///
/// Feature tags are inherited by the scenario.
#[must_use]
pub fn scenario_info(feature: &gherkin::Feature, scenario: &gherkin::Scenario) -> ScenarioInfo {
    let tags = feature.tags.iter().chain(scenario.tags.iter());
    let info = ScenarioInfo::new(scenario.name.clone()).with_tags(tags);
    match &feature.path {
        Some(path) => info.with_location(format!("{}:{}", path.display(), scenario.position.line)),
        None => info,
    }
}

/// Map cucumber's scenario result onto an outcome
#[must_use]
pub fn outcome_of(finished: &event::ScenarioFinished) -> ScenarioOutcome {
    match finished {
        event::ScenarioFinished::StepPassed => ScenarioOutcome::passed(),
        event::ScenarioFinished::StepSkipped => ScenarioOutcome::skipped(),
        other => ScenarioOutcome::failed(format!("{other:?}")),
    }
}

/// Start the suite on the blocking pool
pub async fn start_suite(orchestrator: &Arc<ScenarioOrchestrator>) -> HandsetResult<()> {
    let orchestrator = Arc::clone(orchestrator);
    tokio::task::spawn_blocking(move || orchestrator.on_suite_start())
        .await
        .map_err(|e| HandsetError::SuiteSetup {
            message: format!("suite start task failed: {e}"),
        })?
}

/// Finish the suite on the blocking pool; returns report locations
pub async fn finish_suite(orchestrator: &Arc<ScenarioOrchestrator>) -> Vec<PathBuf> {
    let orchestrator = Arc::clone(orchestrator);
    match tokio::task::spawn_blocking(move || orchestrator.finish_suite()).await {
        Ok(locations) => locations,
        Err(e) => {
            tracing::error!(error = %e, "suite end task failed");
            Vec::new()
        }
    }
}

/// `before` hook body
///
/// A setup failure panics, which cucumber reports as a failed scenario.
pub fn before_scenario<'a, W: HasContext>(
    orchestrator: Arc<ScenarioOrchestrator>,
    feature: &'a gherkin::Feature,
    _rule: Option<&'a gherkin::Rule>,
    scenario: &'a gherkin::Scenario,
    world: &'a mut W,
) -> LocalBoxFuture<'a, ()> {
    let context = world.context().clone();
    let info = scenario_info(feature, scenario);
    async move {
        let started =
            tokio::task::spawn_blocking(move || orchestrator.on_scenario_start(&context, &info)).await;
        match started {
            Ok(Ok(())) => {}
            Ok(Err(e)) => panic!("{e}"),
            Err(e) => panic!("scenario setup task failed: {e}"),
        }
    }
    .boxed_local()
}

/// `after` hook body
pub fn after_scenario<'a, W: HasContext>(
    orchestrator: Arc<ScenarioOrchestrator>,
    _feature: &'a gherkin::Feature,
    _rule: Option<&'a gherkin::Rule>,
    scenario: &'a gherkin::Scenario,
    finished: &'a event::ScenarioFinished,
    world: Option<&'a mut W>,
) -> LocalBoxFuture<'a, ()> {
    let Some(world) = world else {
        tracing::warn!(scenario = %scenario.name, "no world for finished scenario; nothing to tear down");
        return futures::future::ready(()).boxed_local();
    };
    let context = world.context().clone();
    let outcome = outcome_of(finished);
    async move {
        let ended =
            tokio::task::spawn_blocking(move || orchestrator.on_scenario_end(&context, &outcome)).await;
        if let Err(e) = ended {
            tracing::error!(error = %e, "scenario teardown task failed");
        }
    }
    .boxed_local()
}
