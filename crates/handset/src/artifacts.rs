//! Output directories and artifact files.
//!
//! Layout under the configured output directory:
//!
//! ```text
//! <output>/
//!   screenshots/     <name>_<label>_<timestamp>_<id>.png
//!   videos/          <name>_recording_<timestamp>_<id>.mp4
//!   allure-results/  per-run Allure result files (purged at suite start)
//!   reports/         HTML / JSON summaries
//! ```
//!
//! Every file name ends in a random id, so concurrent scenarios sharing a
//! name (outline example rows) never write to the same path. Files are
//! opened with `create_new` and are never overwritten.

use crate::result::HandsetResult;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Replace every character outside `[A-Za-z0-9._-]` with `_`
///
/// Idempotent: sanitizing a sanitized name returns it unchanged. Empty input
/// becomes `scenario`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "scenario".to_string()
    } else {
        sanitized
    }
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Artifact directories for one run
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Output root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Screenshot directory
    #[must_use]
    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join("screenshots")
    }

    /// Recording directory
    #[must_use]
    pub fn videos_dir(&self) -> PathBuf {
        self.root.join("videos")
    }

    /// Allure results directory
    #[must_use]
    pub fn allure_results_dir(&self) -> PathBuf {
        self.root.join("allure-results")
    }

    /// HTML / JSON report directory
    #[must_use]
    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    /// Create all directories and purge Allure results from earlier runs
    pub fn prepare(&self) -> HandsetResult<()> {
        let results = self.allure_results_dir();
        if results.exists() {
            fs::remove_dir_all(&results)?;
            tracing::debug!(path = %results.display(), "purged stale allure results");
        }
        for dir in [
            self.screenshots_dir(),
            self.videos_dir(),
            results,
            self.reports_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Path for a screenshot of `scenario` labelled `label`
    #[must_use]
    pub fn screenshot_path(&self, scenario: &str, label: &str) -> PathBuf {
        self.screenshots_dir().join(format!(
            "{}_{}_{}.png",
            sanitize_name(scenario),
            sanitize_name(label),
            unique_stamp()
        ))
    }

    /// Path for a recording of `scenario`
    #[must_use]
    pub fn video_path(&self, scenario: &str) -> PathBuf {
        self.videos_dir()
            .join(format!("{}_recording_{}.mp4", sanitize_name(scenario), unique_stamp()))
    }

    /// Write a PNG screenshot and return its path
    pub fn save_screenshot(&self, scenario: &str, label: &str, png: &[u8]) -> HandsetResult<PathBuf> {
        let path = self.screenshot_path(scenario, label);
        write_file(&path, png)?;
        Ok(path)
    }

    /// Write an MP4 recording and return its path
    pub fn save_video(&self, scenario: &str, mp4: &[u8]) -> HandsetResult<PathBuf> {
        let path = self.video_path(scenario);
        write_file(&path, mp4)?;
        Ok(path)
    }

    /// Delete screenshots, recordings and reports older than `max_age`
    ///
    /// Returns the number of files removed. Files whose age cannot be read
    /// are kept.
    pub fn purge_older_than(&self, max_age: Duration) -> HandsetResult<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        for dir in [self.screenshots_dir(), self.videos_dir(), self.reports_dir()] {
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let age = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok());
                if age.is_some_and(|age| age > max_age) {
                    fs::remove_file(&path)?;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            tracing::info!(removed, max_age_secs = max_age.as_secs(), "purged expired artifacts");
        }
        Ok(removed)
    }

    /// Delete every artifact directory
    pub fn purge_all(&self) -> HandsetResult<()> {
        for dir in [
            self.screenshots_dir(),
            self.videos_dir(),
            self.allure_results_dir(),
            self.reports_dir(),
        ] {
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> HandsetResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    Ok(())
}

fn unique_stamp() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}_{}", timestamp(), &id[..8])
}
