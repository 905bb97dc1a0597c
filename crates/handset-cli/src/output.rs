//! Status lines and suite summaries
//!
//! Status goes to stderr; command data (config dumps, capability JSON) goes to
//! stdout so it can be piped.

use console::{style, Style, Term};
use std::time::Duration;

/// Console reporter for command status
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            use_color: use_color && console::colors_enabled_stderr(),
            quiet,
        }
    }

    fn line(&self, symbol: &str, paint: fn(&str) -> String, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            paint(symbol)
        } else {
            symbol.to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a success line
    pub fn success(&self, message: &str) {
        self.line("✓", |s| style(s).green().bold().to_string(), message);
    }

    /// Print a failure line (shown even in quiet mode)
    pub fn failure(&self, message: &str) {
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "✗".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning line
    pub fn warning(&self, message: &str) {
        self.line("⚠", |s| style(s).yellow().bold().to_string(), message);
    }

    /// Print an info line
    pub fn info(&self, message: &str) {
        self.line("ℹ", |s| style(s).blue().bold().to_string(), message);
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            title.to_string()
        };
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Print the scenario summary line
    pub fn summary(&self, passed: usize, failed: usize, skipped: usize, duration: Duration) {
        if self.quiet && failed == 0 {
            return;
        }
        let _ = self.term.write_line(&format_summary(
            passed,
            failed,
            skipped,
            duration,
            self.use_color,
        ));
    }
}

/// Render the summary line
#[must_use]
pub fn format_summary(
    passed: usize,
    failed: usize,
    skipped: usize,
    duration: Duration,
    use_color: bool,
) -> String {
    let verdict = if failed > 0 { "FAILED" } else { "PASSED" };
    let secs = duration.as_secs_f64();
    if use_color {
        let verdict_style = if failed > 0 {
            Style::new().red().bold()
        } else {
            Style::new().green().bold()
        };
        format!(
            "{}: {} passed, {} failed, {} skipped ({secs:.2}s)",
            verdict_style.apply_to(verdict),
            Style::new().green().apply_to(passed),
            Style::new().red().apply_to(failed),
            Style::new().yellow().apply_to(skipped),
        )
    } else {
        format!("{verdict}: {passed} passed, {failed} failed, {skipped} skipped ({secs:.2}s)")
    }
}
