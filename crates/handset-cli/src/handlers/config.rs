//! Config command handler

use crate::{Cli, CliError, CliResult, ConfigArgs, ConfigFormat};
use handset::config::ResolvedValue;
use handset::Settings;
use serde::Serialize;
use std::collections::BTreeMap;

/// Execute the config command
pub fn execute_config(cli: &Cli, args: &ConfigArgs) -> CliResult<()> {
    let settings = super::load_settings(cli, &[])?;
    print!("{}", render_config(&settings, args.format)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct ConfigDump<'a> {
    environment: &'a str,
    platform: String,
    properties: &'a BTreeMap<String, ResolvedValue>,
}

/// Render every resolved key with the layer it came from
pub fn render_config(settings: &Settings, format: ConfigFormat) -> CliResult<String> {
    let dump = ConfigDump {
        environment: settings.environment().unwrap_or("default"),
        platform: settings.platform().to_string(),
        properties: settings.resolved(),
    };
    match format {
        ConfigFormat::Yaml => serde_yaml_ng::to_string(&dump).map_err(CliError::render),
        ConfigFormat::Json => serde_json::to_string_pretty(&dump)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(CliError::render),
    }
}
