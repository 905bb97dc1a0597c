//! Logging and tracing configuration
//!
//! Structured logs go to stderr so they never mix with command output.
//! `RUST_LOG` wins over the verbosity flags when it is set.

use std::str::FromStr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter: this crate at INFO, dependencies at WARN
pub const DEFAULT_FILTER: &str = "handset=info,warn";

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact human-readable lines
    #[default]
    Text,
    /// One JSON object per line (CI log collectors)
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}', expected text or json")),
        }
    }
}

/// Filter directive for a verbosity count (`-v` = 1, `-vv` = 2, `--quiet` = -1)
#[must_use]
pub fn filter_directive(verbosity: i8) -> &'static str {
    match verbosity {
        i8::MIN..=-1 => "handset=error,error",
        0 => DEFAULT_FILTER,
        1 => "handset=debug,info",
        _ => "handset=trace,debug",
    }
}

/// Install the global subscriber
///
/// Safe to call more than once; later calls are ignored (tests and the BDD
/// harness may both try).
pub fn init(format: LogFormat, verbosity: i8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity)));

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false)
                    .with_thread_names(true),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
