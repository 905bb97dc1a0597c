//! Scenario Hook Orchestrator
//!
//! Four sequencing points bracket a test run:
//!
//! ```text
//! on_suite_start ──► { on_scenario_start ─► steps ─► on_scenario_end }* ──► on_suite_end
//!   fatal              fatal to scenario            never propagates       logged only
//! ```
//!
//! A BDD engine (or a plain test) drives these hooks; the orchestrator owns
//! everything that happens between them.

mod orchestrator;
mod scenario;

pub use orchestrator::ScenarioOrchestrator;
pub use scenario::{ScenarioContext, ScenarioInfo, ScenarioOutcome, ScenarioStatus};

use crate::registry::ContextId;
use crate::result::HandsetResult;

/// Lifecycle callbacks invoked by a test engine
pub trait LifecycleHooks: Send + Sync {
    /// Once, before any scenario. An error aborts the run.
    fn on_suite_start(&self) -> HandsetResult<()>;

    /// Before each scenario. An error fails that scenario; the engine must
    /// still call [`on_scenario_end`](Self::on_scenario_end).
    fn on_scenario_start(&self, context: &ContextId, info: &ScenarioInfo) -> HandsetResult<()>;

    /// After each scenario, with its final status. Best-effort: failures are
    /// logged and the context's session is always released.
    fn on_scenario_end(&self, context: &ContextId, outcome: &ScenarioOutcome);

    /// Once, after every scenario.
    fn on_suite_end(&self);
}
