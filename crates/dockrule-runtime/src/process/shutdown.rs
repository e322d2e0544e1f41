//! Graceful stop for `tokio::process::Child` with SIGTERM → SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tracing::debug;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

#[cfg(unix)]
use crate::wait::millis;

/// Stop `child`, giving it `grace` to exit after SIGTERM before SIGKILL.
///
/// Returns once the process has been reaped. A child that already exited
/// just reports its status.
pub async fn stop_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        stop_unix(child, grace).await
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        child.kill().await?;
        child.wait().await
    }
}

#[cfg(unix)]
async fn stop_unix(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    // No PID means the child was reaped already.
    let Some(pid) = child.id() else {
        return child.wait().await;
    };
    let pid = i32::try_from(pid).map_err(io::Error::other)?;

    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await;
        }
        return Err(io::Error::other(e));
    }

    if let Ok(result) = tokio::time::timeout(grace, child.wait()).await {
        return result;
    }

    debug!(pid, grace_ms = millis(grace), "child ignored SIGTERM, killing");
    child.kill().await?;
    child.wait().await
}
