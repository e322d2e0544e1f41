//! Line listener port.
//!
//! A line listener receives log lines one at a time, without their trailing
//! line terminator. Implementations are called from log worker tasks and
//! must not block for long.

/// Something that listens for log lines.
pub trait LineListener: Send + Sync {
    /// Receive the next line.
    fn next_line(&self, line: &str);
}

impl<F> LineListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn next_line(&self, line: &str) {
        self(line);
    }
}
