//! Waiting for a container's start conditions.

use std::time::Duration;

use async_trait::async_trait;
use dockrule_core::{StartConditionCheck, WaitError, WaitSettings};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::unit::{WaitCondition, WaitForUnit};
use crate::conditions::{ConditionContext, StartCondition};

/// Runs `after()` on drop, so cleanup happens on every exit path,
/// including a cancelled future.
struct AfterGuard<'a> {
    check: &'a dyn StartConditionCheck,
}

impl Drop for AfterGuard<'_> {
    fn drop(&mut self) {
        self.check.after();
    }
}

struct CheckCondition<'a> {
    check: &'a dyn StartConditionCheck,
    description: String,
    container: &'a str,
}

#[async_trait]
impl<'a> WaitCondition for CheckCondition<'a> {
    async fn is_condition_met(&self) -> Result<bool, WaitError> {
        self.check.check().await
    }

    fn tick_message(&self) -> String {
        self.description.clone()
    }

    fn timeout_message(&self) -> String {
        format!(
            "timeout waiting for {} in container {}",
            self.description, self.container
        )
    }
}

/// Poll `check` until it is met, using the timeout and tick from `settings`.
///
/// `check.after()` is called exactly once, however waiting ends.
pub async fn wait_for_condition(
    check: &dyn StartConditionCheck,
    settings: &WaitSettings,
    container: &str,
    interrupt: Option<&CancellationToken>,
) -> Result<Duration, WaitError> {
    let _after = AfterGuard { check };
    let description = check.describe();
    info!(container, "wait for {} started", description);

    let mut unit = WaitForUnit::new(settings.timeout()).with_tick(settings.tick());
    if let Some(token) = interrupt {
        unit = unit.with_interrupt(token.clone());
    }

    let condition = CheckCondition {
        check,
        description,
        container,
    };
    let elapsed = unit.start_waiting(&condition).await?;
    info!(container, "wait for {} - condition met", condition.description);
    Ok(elapsed)
}

/// Gates on [`StartCondition`]s against one running container.
pub struct WaitForContainer {
    context: ConditionContext,
    settings: WaitSettings,
    interrupt: Option<CancellationToken>,
}

impl WaitForContainer {
    pub const fn new(context: ConditionContext, settings: WaitSettings) -> Self {
        Self {
            context,
            settings,
            interrupt: None,
        }
    }

    /// Cancelling `token` aborts any wait with [`WaitError::Interrupted`].
    #[must_use]
    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = Some(token);
        self
    }

    pub const fn context(&self) -> &ConditionContext {
        &self.context
    }

    pub const fn settings(&self) -> &WaitSettings {
        &self.settings
    }

    /// Build `condition`'s check and wait for it with the configured timeout.
    pub async fn wait_until(&self, condition: &StartCondition) -> Result<Duration, WaitError> {
        let check = condition.build(&self.context)?;
        let container = self.context.container.describe();
        wait_for_condition(
            check.as_ref(),
            &self.settings,
            &container,
            self.interrupt.as_ref(),
        )
        .await
    }

    /// Wait for each condition in turn, each with the full timeout.
    ///
    /// Returns the total time spent.
    pub async fn wait_until_all(&self, conditions: &[StartCondition]) -> Result<Duration, WaitError> {
        let mut total = Duration::ZERO;
        for condition in conditions {
            total += self.wait_until(condition).await?;
        }
        Ok(total)
    }

    /// Wait up to `timeout_secs` for `message` to show up in the full log.
    pub async fn wait_for_log_message(
        &self,
        message: &str,
        timeout_secs: u64,
    ) -> Result<Duration, WaitError> {
        let settings = self.settings.with_timeout_secs(timeout_secs);
        let check = StartCondition::log_message(message).build(&self.context)?;
        let container = self.context.container.describe();
        wait_for_condition(check.as_ref(), &settings, &container, self.interrupt.as_ref()).await
    }
}
