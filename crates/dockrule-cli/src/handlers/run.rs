//! `dockrule run`: spawn, capture, wait.

use std::sync::Arc;
use std::time::Duration;

use dockrule_core::WaitSettings;
use dockrule_runtime::{ConditionContext, LocalProcess, LogCapture, WaitForContainer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::RunArgs;
use crate::error::CliError;

/// Run the program described by `args` and wait until it is ready.
///
/// Returns the time it took to become ready. Unless `exit_when_ready` is
/// set, keeps streaming output until the program exits or Ctrl-C.
pub async fn execute(args: &RunArgs, settings: WaitSettings) -> Result<Duration, CliError> {
    let settings = args.apply_to(settings);
    dockrule_core::validate_settings(&settings)?;

    let (program, program_args) = args
        .command
        .split_first()
        .ok_or_else(|| CliError::Arguments("missing PROGRAM".to_string()))?;

    let process = Arc::new(LocalProcess::spawn(program, program_args, args.port_map())?);
    let mut capture = LogCapture::start(process.clone(), args.capture_options(&settings));

    let interrupt = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let interrupt = interrupt.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("ctrl-c received");
                interrupt.cancel();
            }
        }
    });

    let conditions = args.conditions();
    let waiter = WaitForContainer::new(
        ConditionContext::from_capture(process.clone(), &capture),
        settings,
    )
    .with_interrupt(interrupt.clone());

    let result = waiter.wait_until_all(&conditions).await;

    if let Ok(elapsed) = result {
        println!("ready in {}ms", elapsed.as_millis());
        if !args.exit_when_ready {
            tokio::select! {
                status = process.wait() => match status {
                    Ok(status) => info!(%status, "program exited"),
                    Err(e) => warn!(error = %e, "failed to wait for program"),
                },
                () = interrupt.cancelled() => info!("interrupted, stopping program"),
            }
        }
    }

    ctrl_c.abort();
    process.kill().await;
    capture.close().await;

    Ok(result?)
}
