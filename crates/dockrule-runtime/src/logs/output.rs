//! Passthrough outputs for printed log lines.
//!
//! A [`LineOutput`] is where a [`LogPrinter`](super::LogPrinter) echoes each
//! line (with its prefix), e.g. the test's own stdout or stderr.

use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Destination for printed log lines.
///
/// Implementations should be thread-safe and non-blocking where possible.
pub trait LineOutput: Send + Sync {
    /// Print one already-prefixed line.
    fn print_line(&self, line: &str);
}

/// Prints to the process stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutOutput;

impl LineOutput for StdoutOutput {
    fn print_line(&self, line: &str) {
        println!("{line}");
    }
}

/// Prints to the process stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrOutput;

impl LineOutput for StderrOutput {
    fn print_line(&self, line: &str) {
        eprintln!("{line}");
    }
}

/// Emits each line as a `tracing` event.
#[derive(Debug, Clone, Copy)]
pub struct TracingOutput {
    stream: &'static str,
}

impl TracingOutput {
    pub const fn new(stream: &'static str) -> Self {
        Self { stream }
    }

    pub const fn stream(&self) -> &'static str {
        self.stream
    }
}

impl LineOutput for TracingOutput {
    fn print_line(&self, line: &str) {
        info!(stream = self.stream, "{}", line);
    }
}

/// Keeps printed lines in memory.
#[derive(Debug, Default)]
pub struct BufferOutput {
    lines: Mutex<Vec<String>>,
}

impl BufferOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line printed so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LineOutput for BufferOutput {
    fn print_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}
