//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use handset::config::{parse_assignment, ENVIRONMENT_VAR};
use handset::{HandsetResult, LoadOptions, LogFormat};
use std::path::PathBuf;

/// Handset: Appium session lifecycle for mobile BDD suites
#[derive(Parser, Debug)]
#[command(name = "handset")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding default.yaml and <env>.yaml
    #[arg(long, default_value = "config", global = true)]
    pub config_dir: PathBuf,

    /// Environment name (selects <config-dir>/<env>.yaml)
    #[arg(long = "env", env = ENVIRONMENT_VAR, global = true)]
    pub environment: Option<String>,

    /// Override a setting (key=value, repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    pub overrides: Vec<String>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log line format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Verbosity as a signed level (`--quiet` is -1)
    #[must_use]
    pub fn verbosity(&self) -> i8 {
        if self.quiet {
            -1
        } else {
            i8::try_from(self.verbose).unwrap_or(i8::MAX)
        }
    }

    /// Configuration sources described by the global flags
    ///
    /// `extra` overrides are applied after `--set` ones.
    pub fn load_options(&self, extra: &[(&str, String)]) -> HandsetResult<LoadOptions> {
        let mut options = LoadOptions::new().with_config_dir(&self.config_dir);
        if let Some(environment) = &self.environment {
            options = options.with_environment(environment);
        }
        for assignment in &self.overrides {
            let (key, value) = parse_assignment(assignment)?;
            options = options.with_override(key, value);
        }
        for (key, value) in extra {
            options = options.with_override(*key, value);
        }
        Ok(options.from_process_env())
    }
}

/// Log format flag
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Compact text
    #[default]
    Text,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print resolved configuration and where each value came from
    Config(ConfigArgs),

    /// Print the Appium capability set for a platform
    Capabilities(CapabilitiesArgs),

    /// Query the Appium server status endpoint
    Status,

    /// Remove expired (or all) artifacts
    Clean(CleanArgs),

    /// Run one scenario through the full session lifecycle
    Smoke(SmokeArgs),
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub format: ConfigFormat,
}

/// Config output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML
    #[default]
    Yaml,
    /// JSON
    Json,
}

/// Arguments for the capabilities command
#[derive(Parser, Debug)]
pub struct CapabilitiesArgs {
    /// Platform (android or ios); defaults to framework.platform
    #[arg(short, long)]
    pub platform: Option<String>,
}

/// Arguments for the clean command
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Remove every artifact, not only expired ones
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the smoke command
#[derive(Parser, Debug)]
pub struct SmokeArgs {
    /// Platform (android or ios); defaults to framework.platform
    #[arg(short, long)]
    pub platform: Option<String>,

    /// Use a simulated device instead of an Appium server
    #[arg(long)]
    pub dry_run: bool,

    /// Scenario name
    #[arg(long, default_value = "Handset smoke")]
    pub name: String,
}
