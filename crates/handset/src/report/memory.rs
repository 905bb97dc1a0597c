//! In-memory sink that records every event it receives.

use super::{Attachment, EnvironmentInfo, ReportSink, ScenarioSummary, StepRecord};
use crate::hooks::ScenarioInfo;
use crate::registry::ContextId;
use crate::result::HandsetResult;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Event observed by a [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    /// Suite started
    SuiteStarted(EnvironmentInfo),
    /// Scenario started
    ScenarioStarted(ContextId, ScenarioInfo),
    /// Step recorded
    Step(ContextId, StepRecord),
    /// File attached
    Attached(ContextId, Attachment),
    /// Scenario finished
    ScenarioFinished(ContextId, ScenarioSummary),
    /// Suite finished
    SuiteFinished,
}

/// Cloneable sink; clones share one event log
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<ReportEvent>>>,
}

impl MemorySink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<ReportEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Events so far, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<ReportEvent> {
        self.log().clone()
    }

    /// Summaries of finished scenarios
    #[must_use]
    pub fn summaries(&self) -> Vec<ScenarioSummary> {
        self.log()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::ScenarioFinished(_, summary) => Some(summary.clone()),
                _ => None,
            })
            .collect()
    }

    /// Steps recorded for `context`
    #[must_use]
    pub fn steps(&self, context: &ContextId) -> Vec<StepRecord> {
        self.log()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Step(ctx, step) if ctx == context => Some(step.clone()),
                _ => None,
            })
            .collect()
    }

    /// Attachments recorded for `context`
    #[must_use]
    pub fn attachments(&self, context: &ContextId) -> Vec<Attachment> {
        self.log()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Attached(ctx, attachment) if ctx == context => Some(attachment.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ReportSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn suite_started(&self, environment: &EnvironmentInfo) -> HandsetResult<()> {
        self.log().push(ReportEvent::SuiteStarted(environment.clone()));
        Ok(())
    }

    fn scenario_started(&self, context: &ContextId, info: &ScenarioInfo) -> HandsetResult<()> {
        self.log()
            .push(ReportEvent::ScenarioStarted(context.clone(), info.clone()));
        Ok(())
    }

    fn step(&self, context: &ContextId, step: StepRecord) -> HandsetResult<()> {
        self.log().push(ReportEvent::Step(context.clone(), step));
        Ok(())
    }

    fn attach(&self, context: &ContextId, attachment: &Attachment) -> HandsetResult<()> {
        self.log()
            .push(ReportEvent::Attached(context.clone(), attachment.clone()));
        Ok(())
    }

    fn scenario_finished(&self, context: &ContextId, summary: &ScenarioSummary) -> HandsetResult<()> {
        self.log()
            .push(ReportEvent::ScenarioFinished(context.clone(), summary.clone()));
        Ok(())
    }

    fn suite_finished(&self) -> HandsetResult<Option<PathBuf>> {
        self.log().push(ReportEvent::SuiteFinished);
        Ok(None)
    }
}
