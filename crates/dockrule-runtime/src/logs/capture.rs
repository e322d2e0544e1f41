//! Live capture of a container's output.
//!
//! [`LogCapture`] wires a container's output channels into a
//! [`LogSplitter`] and runs one worker per pipe plus the attach task:
//!
//! - stdout printer → stdout passthrough output
//! - stderr printer → stderr passthrough output
//! - combined printer → [`LineListenerProxy`] (readiness listeners)
//! - attach task → [`ContainerControl::attach_output`]

use std::sync::Arc;
use std::time::Duration;

use dockrule_core::{
    ContainerControl, DEFAULT_HISTORY_LIMIT, DEFAULT_SHUTDOWN_GRACE_MS, LineListener,
    WaitSettings,
};
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::wait::millis;

use super::output::{LineOutput, StderrOutput, StdoutOutput};
use super::printer::LogPrinter;
use super::proxy::LineListenerProxy;
use super::splitter::{LineSource, LogSplitter};

/// Options for [`LogCapture::start`].
#[derive(Clone)]
pub struct CaptureOptions {
    /// Passthrough for stdout lines; `None` drains silently.
    pub stdout: Option<Arc<dyn LineOutput>>,
    /// Passthrough for stderr lines; `None` drains silently.
    pub stderr: Option<Arc<dyn LineOutput>>,
    /// Listener registered on the combined stream before capture starts.
    pub listener: Option<Arc<dyn LineListener>>,
    /// Number of combined lines replayed to late listeners.
    pub history_limit: usize,
    /// How long `close` waits for workers before abandoning them.
    pub shutdown_grace: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            stdout: Some(Arc::new(StdoutOutput)),
            stderr: Some(Arc::new(StderrOutput)),
            listener: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            shutdown_grace: Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MS),
        }
    }
}

impl CaptureOptions {
    /// Defaults with history limit and grace period taken from `settings`.
    pub fn from_settings(settings: &WaitSettings) -> Self {
        Self {
            history_limit: settings.history_limit,
            shutdown_grace: settings.shutdown_grace(),
            ..Self::default()
        }
    }

    /// No passthrough printing at all.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.stdout = None;
        self.stderr = None;
        self
    }

    #[must_use]
    pub fn with_stdout(mut self, output: Arc<dyn LineOutput>) -> Self {
        self.stdout = Some(output);
        self
    }

    #[must_use]
    pub fn with_stderr(mut self, output: Arc<dyn LineOutput>) -> Self {
        self.stderr = Some(output);
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn LineListener>) -> Self {
        self.listener = Some(listener);
        self
    }
}

/// Handle to a running capture. Call [`close`](Self::close) when done.
pub struct LogCapture {
    container_id: String,
    splitter: LogSplitter,
    lines: Arc<LineListenerProxy>,
    workers: Vec<JoinHandle<()>>,
    shutdown_grace: Duration,
    closed: bool,
}

fn spawn_printer(
    prefix: String,
    source: LineSource,
    output: Option<Arc<dyn LineOutput>>,
    listener: Option<Arc<dyn LineListener>>,
) -> JoinHandle<()> {
    let mut printer = LogPrinter::new(prefix, source);
    if let Some(output) = output {
        printer = printer.with_output(output);
    }
    if let Some(listener) = listener {
        printer = printer.with_listener(listener);
    }
    tokio::spawn(async move {
        printer.run().await;
    })
}

impl LogCapture {
    /// Start capturing `container`'s output. Must run inside a tokio runtime.
    pub fn start(container: Arc<dyn ContainerControl>, options: CaptureOptions) -> Self {
        let container_id = container.describe();
        let mut splitter = LogSplitter::new();
        let lines = Arc::new(LineListenerProxy::with_history_limit(options.history_limit));
        if let Some(listener) = options.listener {
            lines.add(listener);
        }

        let mut workers = Vec::with_capacity(4);
        if let Some(source) = splitter.take_stdout_input() {
            let prefix = format!("{container_id}-stdout> ");
            workers.push(spawn_printer(prefix, source, options.stdout, None));
        }
        if let Some(source) = splitter.take_stderr_input() {
            let prefix = format!("{container_id}-stderr> ");
            workers.push(spawn_printer(prefix, source, options.stderr, None));
        }
        if let Some(source) = splitter.take_combined_input() {
            let listener: Arc<dyn LineListener> = lines.clone();
            workers.push(spawn_printer(String::new(), source, None, Some(listener)));
        }
        if let Some((stdout, stderr)) = splitter.take_sinks() {
            let id = container_id.clone();
            workers.push(tokio::spawn(async move {
                trace!(container = %id, "attaching to output");
                match container
                    .attach_output(Box::new(stdout), Box::new(stderr))
                    .await
                {
                    Ok(()) => trace!(container = %id, "detached from output"),
                    Err(e) => warn!(container = %id, error = %e, "output attach ended with error"),
                }
            }));
        }

        debug!(container = %container_id, "log capture started");

        Self {
            container_id,
            splitter,
            lines,
            workers,
            shutdown_grace: options.shutdown_grace,
            closed: false,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Combined line feed; listeners added here get the history replayed.
    pub fn lines(&self) -> Arc<LineListenerProxy> {
        self.lines.clone()
    }

    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the pipes and wait up to the grace period for the workers.
    ///
    /// Idempotent. Workers still running after the grace period are left
    /// to finish on their own.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.splitter.close();

        let workers = std::mem::take(&mut self.workers);
        let count = workers.len();
        match tokio::time::timeout(self.shutdown_grace, join_all(workers)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(container = %self.container_id, error = %e, "log worker failed");
                    }
                }
            }
            Err(_) => {
                warn!(
                    container = %self.container_id,
                    workers = count,
                    grace_ms = millis(self.shutdown_grace),
                    "log workers still running after grace period, abandoning"
                );
            }
        }

        debug!(container = %self.container_id, "log capture closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::output::BufferOutput;
    use async_trait::async_trait;
    use dockrule_core::{ContainerError, ExternalAddress, OutputSink};
    use std::sync::Mutex;
    use tokio::io::AsyncWriteExt;

    /// Writes a fixed script of `(is_stderr, bytes)` chunks, then optionally
    /// keeps the sinks open until they break.
    struct ScriptedContainer {
        chunks: Vec<(bool, &'static [u8])>,
        linger: bool,
    }

    #[async_trait]
    impl ContainerControl for ScriptedContainer {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        async fn attach_output(
            &self,
            mut stdout: OutputSink,
            mut stderr: OutputSink,
        ) -> Result<(), ContainerError> {
            for (is_stderr, bytes) in &self.chunks {
                if *is_stderr {
                    stderr.write_all(bytes).await?;
                } else {
                    stdout.write_all(bytes).await?;
                }
            }
            while self.linger {
                stdout.write_all(b"tick\n").await?;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            Ok(())
        }

        async fn full_log(&self) -> Result<String, ContainerError> {
            Ok(String::new())
        }

        fn resolve_external_address(
            &self,
            internal_port: u16,
        ) -> Result<ExternalAddress, ContainerError> {
            Err(ContainerError::PortNotExposed(internal_port))
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl LineListener for Recorder {
        fn next_line(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    #[tokio::test]
    async fn test_capture_routes_each_channel() {
        let container = Arc::new(ScriptedContainer {
            chunks: vec![(false, b"A\n"), (true, b"B\n")],
            linger: false,
        });
        let out = Arc::new(BufferOutput::new());
        let err = Arc::new(BufferOutput::new());
        let combined = Arc::new(Recorder::default());

        let mut capture = LogCapture::start(
            container,
            CaptureOptions::default()
                .with_stdout(out.clone())
                .with_stderr(err.clone())
                .with_listener(combined.clone()),
        );
        // The script ends by itself, so every worker finishes within the grace period.
        tokio::time::sleep(Duration::from_millis(50)).await;
        capture.close().await;

        assert_eq!(out.lines(), vec!["scripted-stdout> A"]);
        assert_eq!(err.lines(), vec!["scripted-stderr> B"]);
        assert_eq!(*combined.0.lock().unwrap(), vec!["A", "B"]);
        assert_eq!(capture.lines().history(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_close_stops_a_lingering_attach() {
        let container = Arc::new(ScriptedContainer {
            chunks: vec![],
            linger: true,
        });
        let mut capture = LogCapture::start(container, CaptureOptions::default().quiet());
        tokio::time::sleep(Duration::from_millis(30)).await;

        tokio::time::timeout(Duration::from_secs(2), capture.close())
            .await
            .expect("close should finish within the grace period");
        assert!(capture.is_closed());

        // Second close is a no-op.
        capture.close().await;
    }
}
