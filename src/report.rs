//! User-facing progress and result messages.
//!
//! Diagnostics go through `tracing`; what the user is meant to read goes
//! through a [`Reporter`] so the lifecycle can be tested without a terminal.

use std::io::{self, Write};

/// Receives messages addressed to the user.
pub trait Reporter {
    /// Prints an informational line.
    fn line(&self, text: &str);

    /// Prints a warning about a step that failed without aborting the
    /// command.
    fn warn(&self, text: &str);
}

/// Writes lines to stdout and warnings to stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalReporter;

impl Reporter for TerminalReporter {
    fn line(&self, text: &str) {
        writeln!(io::stdout().lock(), "{text}").ok();
    }

    fn warn(&self, text: &str) {
        write_warning(io::stderr().lock(), text);
    }
}

fn write_warning(mut target: impl Write, text: &str) {
    writeln!(target, "warning: {text}").ok();
}
