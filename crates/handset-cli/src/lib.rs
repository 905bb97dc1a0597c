//! Handset CLI library
//!
//! Operator commands around the handset library: inspect the resolved
//! configuration, preview capabilities, query the Appium server, clean
//! artifacts and run a one-scenario smoke lifecycle.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod error;
pub mod handlers;
mod output;

pub use commands::{
    CapabilitiesArgs, CleanArgs, Cli, Commands, ConfigArgs, ConfigFormat, LogFormatArg, SmokeArgs,
};
pub use error::{CliError, CliResult};
pub use output::{format_summary, Reporter};
