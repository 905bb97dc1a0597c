//! Handset CLI: operator commands for Appium-backed suites
//!
//! ## Usage
//!
//! ```bash
//! handset config --env staging            # Resolved settings and their sources
//! handset capabilities --platform ios     # Capability JSON for a new session
//! handset status                          # Query the Appium server
//! handset clean --all                     # Remove screenshots, videos, reports
//! handset smoke --dry-run                 # Full lifecycle against a simulated device
//! ```

use clap::Parser;
use handset::logging;
use handset_cli::{handlers, Cli, CliResult, Commands, Reporter};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format.into(), cli.verbosity());
    let reporter = Reporter::new(true, cli.quiet);

    match &cli.command {
        Commands::Config(args) => handlers::config::execute_config(&cli, args),
        Commands::Capabilities(args) => handlers::capabilities::execute_capabilities(&cli, args),
        Commands::Status => handlers::status::execute_status(&cli, &reporter),
        Commands::Clean(args) => handlers::clean::execute_clean(&cli, args, &reporter),
        Commands::Smoke(args) => handlers::smoke::execute_smoke(&cli, args, &reporter),
    }
}
