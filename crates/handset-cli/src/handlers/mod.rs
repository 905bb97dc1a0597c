//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains:
//! - The execution logic for a CLI command
//! - Pure helper functions
//! - Tests

pub mod capabilities;
pub mod clean;
pub mod config;
pub mod smoke;
pub mod status;

use crate::{Cli, CliResult};
use handset::Settings;

/// Load settings from the global flags plus command-specific overrides
pub fn load_settings(cli: &Cli, extra: &[(&str, String)]) -> CliResult<Settings> {
    let options = cli.load_options(extra)?;
    Ok(Settings::load(&options)?)
}

/// `framework.platform` override for an optional `--platform` flag
#[must_use]
pub fn platform_override(platform: Option<&str>) -> Vec<(&'static str, String)> {
    platform
        .map(|p| vec![("framework.platform", p.to_string())])
        .unwrap_or_default()
}
