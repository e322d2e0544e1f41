//! Stdout/stderr splitter.
//!
//! Joins a process's stdout and stderr into a set of line sources where one
//! of the sources carries the combined content of both channels.
//!
//! Bytes written to a [`LogSink`] are cut into lines at write time (`\n`,
//! with a preceding `\r` trimmed, invalid UTF-8 decoded lossily). Each
//! complete line is pushed to the sink's own pipe and to the combined pipe
//! under a single lock, so the combined source never interleaves two
//! channels inside one line.
//!
//! An unterminated line is held back until its `\n` arrives, but never more
//! than [`MAX_PARTIAL_LINE`] bytes of it: past that, the held bytes are
//! published as a line of their own.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::debug;

/// Identifies one of the splitter's line pipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStream {
    Stdout,
    Stderr,
    Combined,
}

impl LogStream {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Combined => "combined",
        }
    }
}

/// Longest partial line a sink holds back before publishing it anyway.
pub const MAX_PARTIAL_LINE: usize = 64 * 1024;

type LineSender = mpsc::UnboundedSender<String>;

/// Sending halves of the three pipes. `None` means closed.
struct Pipes {
    stdout: Option<LineSender>,
    stderr: Option<LineSender>,
    combined: Option<LineSender>,
}

impl Pipes {
    const fn own(&self, stream: LogStream) -> Option<&LineSender> {
        match stream {
            LogStream::Stdout => self.stdout.as_ref(),
            LogStream::Stderr => self.stderr.as_ref(),
            LogStream::Combined => self.combined.as_ref(),
        }
    }

    const fn is_open(&self, stream: LogStream) -> bool {
        self.own(stream).is_some()
    }

    /// Push one line to the stream's own pipe and to the combined pipe.
    ///
    /// A reader that went away is not an error; a closed pipe is.
    fn send(&self, stream: LogStream, line: String) -> io::Result<()> {
        let Some(own) = self.own(stream) else {
            return Err(broken_pipe(stream));
        };
        if let Some(combined) = &self.combined {
            let _ = own.send(line.clone());
            let _ = combined.send(line);
        } else {
            let _ = own.send(line);
        }
        Ok(())
    }

    fn close(&mut self, stream: LogStream) {
        match stream {
            LogStream::Stdout => self.stdout = None,
            LogStream::Stderr => self.stderr = None,
            LogStream::Combined => self.combined = None,
        }
        if self.stdout.is_none() && self.stderr.is_none() {
            self.combined = None;
        }
    }

    fn close_all(&mut self) {
        self.stdout = None;
        self.stderr = None;
        self.combined = None;
    }
}

type SharedPipes = Arc<Mutex<Pipes>>;

// Poisoning is ignored so closing the pipes always succeeds.
fn lock(pipes: &Mutex<Pipes>) -> MutexGuard<'_, Pipes> {
    pipes.lock().unwrap_or_else(PoisonError::into_inner)
}

fn broken_pipe(stream: LogStream) -> io::Error {
    io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("{} log pipe is closed", stream.as_str()),
    )
}

/// Converts a raw line (without `\n`) to text, trimming a trailing `\r`.
fn decode_line(mut raw: Vec<u8>) -> String {
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    String::from_utf8_lossy(&raw).into_owned()
}

/// Write end of one output channel.
///
/// Implements both [`AsyncWrite`] and [`io::Write`]. Dropping the sink (or
/// shutting it down) emits a trailing unterminated line, if any, and closes
/// the channel's pipe.
pub struct LogSink {
    stream: LogStream,
    pipes: SharedPipes,
    pending: Vec<u8>,
    closed: bool,
}

impl LogSink {
    const fn new(stream: LogStream, pipes: SharedPipes) -> Self {
        Self {
            stream,
            pipes,
            pending: Vec::new(),
            closed: false,
        }
    }

    pub const fn stream(&self) -> LogStream {
        self.stream
    }

    /// Append bytes, publishing every line they complete.
    pub fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.closed || !lock(&self.pipes).is_open(self.stream) {
            return Err(broken_pipe(self.stream));
        }

        self.pending.extend_from_slice(buf);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut raw: Vec<u8> = self.pending.drain(..=pos).collect();
            raw.pop();
            lines.push(decode_line(raw));
        }
        while self.pending.len() >= MAX_PARTIAL_LINE {
            let raw: Vec<u8> = self.pending.drain(..MAX_PARTIAL_LINE).collect();
            debug!(
                stream = self.stream.as_str(),
                bytes = MAX_PARTIAL_LINE,
                "partial line too long, publishing it as is"
            );
            lines.push(decode_line(raw));
        }
        if lines.is_empty() {
            return Ok(());
        }

        let pipes = lock(&self.pipes);
        for line in lines {
            pipes.send(self.stream, line)?;
        }
        Ok(())
    }

    /// Flush a trailing partial line and close this channel. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut pipes = lock(&self.pipes);
        if !self.pending.is_empty() {
            let raw = std::mem::take(&mut self.pending);
            // Closed by the splitter already: nothing left to deliver to.
            let _ = pipes.send(self.stream, decode_line(raw));
        }
        pipes.close(self.stream);
        debug!(stream = self.stream.as_str(), "log sink closed");
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        self.close();
    }
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsyncWrite for LogSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(self.get_mut().write_bytes(buf).map(|()| buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().close();
        Poll::Ready(Ok(()))
    }
}

/// Read end of one pipe: a stream of lines without terminators.
#[derive(Debug)]
pub struct LineSource {
    stream: LogStream,
    rx: mpsc::UnboundedReceiver<String>,
}

impl LineSource {
    pub const fn stream(&self) -> LogStream {
        self.stream
    }

    /// Next line, or `None` once the pipe is closed and drained.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Stop accepting new lines. Already buffered lines remain readable.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Splits two output channels into stdout, stderr and combined line sources.
///
/// Each part is handed out once through the `take_*` methods. Parts that were
/// never taken are closed together with the splitter.
pub struct LogSplitter {
    pipes: SharedPipes,
    sinks: Option<(LogSink, LogSink)>,
    stdout_input: Option<LineSource>,
    stderr_input: Option<LineSource>,
    combined_input: Option<LineSource>,
    closed: bool,
}

impl LogSplitter {
    pub fn new() -> Self {
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
        let (combined_tx, combined_rx) = mpsc::unbounded_channel();

        let pipes = Arc::new(Mutex::new(Pipes {
            stdout: Some(stdout_tx),
            stderr: Some(stderr_tx),
            combined: Some(combined_tx),
        }));

        let sinks = (
            LogSink::new(LogStream::Stdout, pipes.clone()),
            LogSink::new(LogStream::Stderr, pipes.clone()),
        );

        Self {
            pipes,
            sinks: Some(sinks),
            stdout_input: Some(LineSource {
                stream: LogStream::Stdout,
                rx: stdout_rx,
            }),
            stderr_input: Some(LineSource {
                stream: LogStream::Stderr,
                rx: stderr_rx,
            }),
            combined_input: Some(LineSource {
                stream: LogStream::Combined,
                rx: combined_rx,
            }),
            closed: false,
        }
    }

    /// Take the `(stdout, stderr)` sinks.
    pub fn take_sinks(&mut self) -> Option<(LogSink, LogSink)> {
        self.sinks.take()
    }

    pub fn take_stdout_input(&mut self) -> Option<LineSource> {
        self.stdout_input.take()
    }

    pub fn take_stderr_input(&mut self) -> Option<LineSource> {
        self.stderr_input.take()
    }

    pub fn take_combined_input(&mut self) -> Option<LineSource> {
        self.combined_input.take()
    }

    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close every pipe. Idempotent and best-effort.
    ///
    /// Writes through sinks handed out earlier start failing with
    /// `BrokenPipe`; readers drain what is buffered and then see the end of
    /// their stream.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        lock(&self.pipes).close_all();

        for source in [
            self.stdout_input.as_mut(),
            self.stderr_input.as_mut(),
            self.combined_input.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            source.close();
        }
        self.sinks = None;

        debug!("log splitter closed");
    }
}

impl Default for LogSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LogSplitter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn drain(source: &mut LineSource) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = source.next_line().await {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_stdout_is_teed_to_combined() {
        let mut splitter = LogSplitter::new();
        let (mut stdout, stderr) = splitter.take_sinks().unwrap();
        let mut stdout_lines = splitter.take_stdout_input().unwrap();
        let mut stderr_lines = splitter.take_stderr_input().unwrap();
        let mut combined_lines = splitter.take_combined_input().unwrap();

        stdout.write_all(b"one\n").await.unwrap();
        drop(stdout);
        drop(stderr);

        assert_eq!(drain(&mut stdout_lines).await, vec!["one"]);
        assert!(drain(&mut stderr_lines).await.is_empty());
        assert_eq!(drain(&mut combined_lines).await, vec!["one"]);
    }

    #[tokio::test]
    async fn test_overlong_partial_line_is_published_in_chunks() {
        let mut splitter = LogSplitter::new();
        let (mut stdout, stderr) = splitter.take_sinks().unwrap();
        let mut stdout_lines = splitter.take_stdout_input().unwrap();

        stdout
            .write_all(&vec![b'a'; MAX_PARTIAL_LINE + 10])
            .await
            .unwrap();
        assert!(stdout.pending.len() < MAX_PARTIAL_LINE);
        stdout.write_all(b"b\n").await.unwrap();
        drop(stdout);
        drop(stderr);

        let lines = drain(&mut stdout_lines).await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "a".repeat(MAX_PARTIAL_LINE));
        assert_eq!(lines[1], format!("{}b", "a".repeat(10)));
    }

    #[tokio::test]
    async fn test_stderr_is_teed_to_combined() {
        let mut splitter = LogSplitter::new();
        let (stdout, mut stderr) = splitter.take_sinks().unwrap();
        let mut stdout_lines = splitter.take_stdout_input().unwrap();
        let mut stderr_lines = splitter.take_stderr_input().unwrap();
        let mut combined_lines = splitter.take_combined_input().unwrap();

        stderr.write_all(b"one\n").await.unwrap();
        drop(stdout);
        drop(stderr);

        assert!(drain(&mut stdout_lines).await.is_empty());
        assert_eq!(drain(&mut stderr_lines).await, vec!["one"]);
        assert_eq!(drain(&mut combined_lines).await, vec!["one"]);
    }

    #[tokio::test]
    async fn test_channels_stay_isolated_and_combined_keeps_write_order() {
        let mut splitter = LogSplitter::new();
        let (mut stdout, mut stderr) = splitter.take_sinks().unwrap();
        let mut stdout_lines = splitter.take_stdout_input().unwrap();
        let mut stderr_lines = splitter.take_stderr_input().unwrap();
        let mut combined_lines = splitter.take_combined_input().unwrap();

        stdout.write_all(b"A\n").await.unwrap();
        stderr.write_all(b"B\n").await.unwrap();
        stdout.write_all(b"C1\nC2\n").await.unwrap();
        stderr.write_all(b"D\n").await.unwrap();
        drop(stdout);
        drop(stderr);

        assert_eq!(drain(&mut stdout_lines).await, vec!["A", "C1", "C2"]);
        assert_eq!(drain(&mut stderr_lines).await, vec!["B", "D"]);
        assert_eq!(
            drain(&mut combined_lines).await,
            vec!["A", "B", "C1", "C2", "D"]
        );
    }

    #[tokio::test]
    async fn test_partial_lines_are_joined_and_never_interleaved() {
        let mut splitter = LogSplitter::new();
        let (mut stdout, mut stderr) = splitter.take_sinks().unwrap();
        let mut combined_lines = splitter.take_combined_input().unwrap();

        stdout.write_all(b"hel").await.unwrap();
        stderr.write_all(b"err\n").await.unwrap();
        stdout.write_all(b"lo\r\nwor").await.unwrap();
        drop(stdout);
        drop(stderr);

        assert_eq!(
            drain(&mut combined_lines).await,
            vec!["err", "hello", "wor"]
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let mut splitter = LogSplitter::new();
        let (mut stdout, _stderr) = splitter.take_sinks().unwrap();
        let mut stdout_lines = splitter.take_stdout_input().unwrap();

        io::Write::write_all(&mut stdout, b"ok \xff\xfe done\n").unwrap();
        drop(stdout);

        let line = stdout_lines.next_line().await.unwrap();
        assert!(line.starts_with("ok "));
        assert!(line.ends_with(" done"));
        assert!(stdout_lines.next_line().await.is_none());
    }

    #[tokio::test]
    async fn test_combined_closes_only_after_both_sinks() {
        let mut splitter = LogSplitter::new();
        let (stdout, mut stderr) = splitter.take_sinks().unwrap();
        let mut combined_lines = splitter.take_combined_input().unwrap();

        drop(stdout);
        stderr.write_all(b"late\n").await.unwrap();
        assert_eq!(combined_lines.next_line().await.as_deref(), Some("late"));

        stderr.shutdown().await.unwrap();
        assert!(combined_lines.next_line().await.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_breaks_writers() {
        let mut splitter = LogSplitter::new();
        let (mut stdout, _stderr) = splitter.take_sinks().unwrap();
        let mut stdout_lines = splitter.take_stdout_input().unwrap();

        stdout.write_all(b"before\n").await.unwrap();
        splitter.close();
        splitter.close();
        assert!(splitter.is_closed());

        let err = stdout.write_all(b"after\n").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        assert_eq!(drain(&mut stdout_lines).await, vec!["before"]);
    }

    #[test]
    fn test_parts_are_handed_out_once() {
        let mut splitter = LogSplitter::new();
        assert!(splitter.take_sinks().is_some());
        assert!(splitter.take_sinks().is_none());
        assert!(splitter.take_combined_input().is_some());
        assert!(splitter.take_combined_input().is_none());
        assert_eq!(
            splitter.take_stdout_input().map(|s| s.stream()),
            Some(LogStream::Stdout)
        );
    }

    #[test]
    fn test_reader_waits_for_a_complete_line() {
        let mut splitter = LogSplitter::new();
        let (mut stdout, _stderr) = splitter.take_sinks().unwrap();
        let mut source = splitter.take_stdout_input().unwrap();

        let mut next = tokio_test::task::spawn(source.next_line());
        tokio_test::assert_pending!(next.poll());

        io::Write::write_all(&mut stdout, b"par").unwrap();
        assert!(!next.is_woken());
        tokio_test::assert_pending!(next.poll());

        io::Write::write_all(&mut stdout, b"tial\n").unwrap();
        assert!(next.is_woken());
        tokio_test::assert_ready_eq!(next.poll(), Some("partial".to_string()));
    }
}
