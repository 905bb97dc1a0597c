//! Scenario metadata and per-scenario state.

use crate::artifacts::sanitize_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Instant;

/// What the BDD engine knows about a scenario before it runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioInfo {
    /// Display name
    pub name: String,
    /// Tags without the leading `@`
    pub tags: Vec<String>,
    /// `path/to/file.feature:line`, when known
    pub location: Option<String>,
}

impl ScenarioInfo {
    /// Untagged scenario
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            location: None,
        }
    }

    /// Attach tags (a leading `@` is stripped)
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = tags
            .into_iter()
            .map(|t| t.as_ref().trim_start_matches('@').to_string())
            .collect();
        self
    }

    /// Attach a source location
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Whether the scenario carries `tag` (with or without `@`)
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim_start_matches('@');
        self.tags.iter().any(|t| t == tag)
    }

    /// Feature name derived from the location's file stem
    #[must_use]
    pub fn feature(&self) -> Option<String> {
        let location = self.location.as_deref()?;
        let file = location.split(':').next().unwrap_or(location);
        Path::new(file)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    }

    /// `location::name`, or the bare name
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.location {
            Some(location) => format!("{location}::{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Final status of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    /// Every step passed
    Passed,
    /// A step failed, or setup failed
    Failed,
    /// Skipped by the engine
    Skipped,
}

impl ScenarioStatus {
    /// Lower-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if status is failing
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result the engine reports when a scenario ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioOutcome {
    /// Final status
    pub status: ScenarioStatus,
    /// Failure or skip reason
    pub message: Option<String>,
}

impl ScenarioOutcome {
    /// Passing outcome
    #[must_use]
    pub const fn passed() -> Self {
        Self {
            status: ScenarioStatus::Passed,
            message: None,
        }
    }

    /// Failing outcome
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ScenarioStatus::Failed,
            message: Some(message.into()),
        }
    }

    /// Skipped outcome
    #[must_use]
    pub const fn skipped() -> Self {
        Self {
            status: ScenarioStatus::Skipped,
            message: None,
        }
    }
}

/// State held for one scenario between its start and end hooks
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    /// Scenario name as written
    pub display_name: String,
    /// Sanitized name used in artifact file names
    pub artifact_name: String,
    /// Monotonic start, for durations
    pub started_at: Instant,
    /// Wall-clock start, for reports
    pub started_wall: DateTime<Utc>,
    /// Whether a recording was started
    pub recording: bool,
}

impl ScenarioContext {
    /// Context for a scenario starting now
    #[must_use]
    pub fn new(info: &ScenarioInfo) -> Self {
        Self {
            display_name: info.name.clone(),
            artifact_name: sanitize_name(&info.name),
            started_at: Instant::now(),
            started_wall: Utc::now(),
            recording: false,
        }
    }
}
