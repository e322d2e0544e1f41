//! Log printer worker.
//!
//! A printer drains one [`LineSource`] to its end, echoing each line to an
//! optional [`LineOutput`] and handing it to an optional [`LineListener`].
//! It stops only when its source ends, never on a timeout.

use std::sync::Arc;

use dockrule_core::LineListener;
use tokio::task::JoinHandle;
use tracing::trace;

use super::output::LineOutput;
use super::splitter::LineSource;

pub struct LogPrinter {
    prefix: String,
    source: LineSource,
    output: Option<Arc<dyn LineOutput>>,
    listener: Option<Arc<dyn LineListener>>,
}

impl LogPrinter {
    /// Create a printer for `source`. Lines are echoed as `prefix + line`.
    pub fn new(prefix: impl Into<String>, source: LineSource) -> Self {
        Self {
            prefix: prefix.into(),
            source,
            output: None,
            listener: None,
        }
    }

    #[must_use]
    pub fn with_output(mut self, output: Arc<dyn LineOutput>) -> Self {
        self.output = Some(output);
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn LineListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Drain the source. Returns the number of lines seen.
    pub async fn run(mut self) -> usize {
        let stream = self.source.stream().as_str();
        trace!(prefix = %self.prefix, stream, "printer task started");

        let mut count = 0;
        while let Some(line) = self.source.next_line().await {
            count += 1;
            trace!(prefix = %self.prefix, stream, "line: {}", line);
            if let Some(ref output) = self.output {
                output.print_line(&format!("{}{}", self.prefix, line));
            }
            if let Some(ref listener) = self.listener {
                listener.next_line(&line);
            }
        }

        trace!(prefix = %self.prefix, stream, lines = count, "printer task exiting");
        count
    }

    /// Run the printer on its own tokio task.
    pub fn spawn(self) -> JoinHandle<usize> {
        tokio::spawn(self.run())
    }
}
