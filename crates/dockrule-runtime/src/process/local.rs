//! [`ContainerControl`] backed by a local child process.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dockrule_core::{ContainerControl, ContainerError, ExternalAddress, OutputSink};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::ports::PortMap;
use super::shutdown::stop_child;

/// Host local process ports are reachable on.
pub const LOCAL_HOST: &str = "127.0.0.1";

/// Time between SIGTERM and SIGKILL when stopping.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

type LogBuffer = Arc<StdMutex<Vec<u8>>>;

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A spawned program with piped stdout and stderr.
///
/// Everything the program prints through an attached output is also kept
/// in a full log buffer. The child is killed when this value is dropped.
pub struct LocalProcess {
    id: String,
    pid: Option<u32>,
    host: String,
    ports: PortMap,
    stop_grace: Duration,
    child: Mutex<Child>,
    pipes: StdMutex<Option<(ChildStdout, ChildStderr)>>,
    full_log: LogBuffer,
}

impl LocalProcess {
    /// Spawn `program` with `args`. Must run inside a tokio runtime.
    pub fn spawn<I, S>(program: &str, args: I, ports: PortMap) -> Result<Self, ContainerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id();
        let name = Path::new(program)
            .file_name()
            .map_or_else(|| program.to_string(), |n| n.to_string_lossy().into_owned());
        let id = pid.map_or_else(|| name.clone(), |pid| format!("{name}-{pid}"));

        let pipes = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => Some((stdout, stderr)),
            _ => None,
        };

        debug!(id = %id, program, "local process spawned");

        Ok(Self {
            id,
            pid,
            host: LOCAL_HOST.to_string(),
            ports,
            stop_grace: DEFAULT_STOP_GRACE,
            child: Mutex::new(child),
            pipes: StdMutex::new(pipes),
            full_log: Arc::new(StdMutex::new(Vec::new())),
        })
    }

    #[must_use]
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the program to exit on its own.
    pub async fn wait(&self) -> Result<ExitStatus, ContainerError> {
        Ok(self.child.lock().await.wait().await?)
    }

    /// SIGTERM, then SIGKILL after the stop grace period.
    pub async fn stop(&self) -> Result<ExitStatus, ContainerError> {
        let mut child = self.child.lock().await;
        let status = stop_child(&mut child, self.stop_grace).await?;
        debug!(id = %self.id, %status, "local process stopped");
        Ok(status)
    }

    /// Like [`stop`](Self::stop), but failures are only logged.
    pub async fn kill(&self) {
        if let Err(e) = self.stop().await {
            warn!(id = %self.id, error = %e, "failed to stop local process");
        }
    }
}

/// Keep reading `reader` into the full log only.
async fn drain<R>(mut reader: R, log: LogBuffer)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 8192];
    while let Ok(n) = reader.read(&mut buf).await {
        if n == 0 {
            break;
        }
        lock(&log).extend_from_slice(&buf[..n]);
    }
}

/// Copy `reader` into `sink` and the full log until either ends.
///
/// A closed sink detaches both channels through `detach`. The rest of the
/// output still goes to the full log, on a background task.
async fn pump<R>(
    mut reader: R,
    mut sink: OutputSink,
    log: LogBuffer,
    detach: CancellationToken,
) -> io::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut buf = vec![0u8; 8192];
    loop {
        let n = tokio::select! {
            read = reader.read(&mut buf) => read?,
            () = detach.cancelled() => {
                tokio::spawn(drain(reader, log));
                return Ok(());
            }
        };
        if n == 0 {
            break;
        }
        // Sink first: whatever the full log shows has reached the printers.
        let written = sink.write_all(&buf[..n]).await;
        lock(&log).extend_from_slice(&buf[..n]);

        if let Err(e) = written {
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(e);
            }
            trace!("output sink closed, detaching");
            detach.cancel();
            tokio::spawn(drain(reader, log));
            return Ok(());
        }
    }
    let _ = sink.shutdown().await;
    Ok(())
}

#[async_trait]
impl ContainerControl for LocalProcess {
    fn describe(&self) -> String {
        self.id.clone()
    }

    async fn attach_output(
        &self,
        stdout: OutputSink,
        stderr: OutputSink,
    ) -> Result<(), ContainerError> {
        let Some((stdout_pipe, stderr_pipe)) = lock(&self.pipes).take() else {
            return Err(ContainerError::Attach(format!(
                "output of {} is already attached",
                self.id
            )));
        };

        let detach = CancellationToken::new();
        let (out, err) = tokio::join!(
            pump(stdout_pipe, stdout, self.full_log.clone(), detach.clone()),
            pump(stderr_pipe, stderr, self.full_log.clone(), detach),
        );
        out?;
        err?;
        Ok(())
    }

    async fn full_log(&self) -> Result<String, ContainerError> {
        Ok(String::from_utf8_lossy(&lock(&self.full_log)).into_owned())
    }

    fn resolve_external_address(&self, internal_port: u16) -> Result<ExternalAddress, ContainerError> {
        self.ports
            .get(internal_port)
            .map(|port| ExternalAddress::new(self.host.clone(), port))
            .ok_or(ContainerError::PortNotExposed(internal_port))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::logs::LogSplitter;

    #[tokio::test]
    async fn test_attach_copies_both_channels_and_keeps_full_log() {
        let process = LocalProcess::spawn("sh", ["-c", "echo out; echo err >&2"], PortMap::new())
            .unwrap();
        assert!(process.id().starts_with("sh-"));

        let mut splitter = LogSplitter::new();
        let (stdout, stderr) = splitter.take_sinks().unwrap();
        let mut out = splitter.take_stdout_input().unwrap();
        let mut err = splitter.take_stderr_input().unwrap();

        process
            .attach_output(Box::new(stdout), Box::new(stderr))
            .await
            .unwrap();

        assert_eq!(out.next_line().await.as_deref(), Some("out"));
        assert_eq!(out.next_line().await, None);
        assert_eq!(err.next_line().await.as_deref(), Some("err"));

        let log = process.full_log().await.unwrap();
        assert!(log.contains("out\n"));
        assert!(log.contains("err\n"));
        assert!(process.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn test_second_attach_is_rejected() {
        let process = LocalProcess::spawn("true", Vec::<String>::new(), PortMap::new()).unwrap();
        let mut splitter = LogSplitter::new();
        let (stdout, stderr) = splitter.take_sinks().unwrap();
        process
            .attach_output(Box::new(stdout), Box::new(stderr))
            .await
            .unwrap();

        let (stdout, stderr) = (Box::new(tokio::io::sink()), Box::new(tokio::io::sink()));
        let err = process.attach_output(stdout, stderr).await.unwrap_err();
        assert!(matches!(err, ContainerError::Attach(_)));
    }

    #[tokio::test]
    async fn test_resolves_mapped_ports_only() {
        let process = LocalProcess::spawn("true", Vec::<String>::new(), PortMap::identity(&[8080]))
            .unwrap();
        assert_eq!(
            process.resolve_external_address(8080).unwrap(),
            ExternalAddress::new(LOCAL_HOST, 8080)
        );
        assert!(matches!(
            process.resolve_external_address(9090),
            Err(ContainerError::PortNotExposed(9090))
        ));
    }

    #[tokio::test]
    async fn test_stop_ends_a_long_running_program() {
        let process = LocalProcess::spawn("sleep", ["30"], PortMap::new())
            .unwrap()
            .with_stop_grace(Duration::from_millis(500));
        let status = process.stop().await.unwrap();
        assert!(!status.success());
    }
}
