//! Deadline-bounded polling loop.

use std::time::Duration;

use async_trait::async_trait;
use dockrule_core::WaitError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use super::millis;

/// Default interval between two evaluations of a condition.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// A predicate polled by [`WaitForUnit`].
#[async_trait]
pub trait WaitCondition: Send + Sync {
    /// `Ok(true)` ends the wait. An `Err` ends it too and is returned as is.
    async fn is_condition_met(&self) -> Result<bool, WaitError>;

    /// Describes what is being waited for.
    fn tick_message(&self) -> String {
        "wait...".to_string()
    }

    /// Detail appended to the timeout error.
    fn timeout_message(&self) -> String {
        "timeout...".to_string()
    }
}

/// [`WaitCondition`] backed by a synchronous closure.
pub struct FnCondition<F> {
    description: String,
    predicate: F,
}

/// Wrap `predicate` as a [`WaitCondition`] described by `description`.
pub fn condition_fn<F>(description: impl Into<String>, predicate: F) -> FnCondition<F>
where
    F: Fn() -> Result<bool, WaitError> + Send + Sync,
{
    FnCondition {
        description: description.into(),
        predicate,
    }
}

#[async_trait]
impl<F> WaitCondition for FnCondition<F>
where
    F: Fn() -> Result<bool, WaitError> + Send + Sync,
{
    async fn is_condition_met(&self) -> Result<bool, WaitError> {
        (self.predicate)()
    }

    fn tick_message(&self) -> String {
        self.description.clone()
    }
}

/// Polls a condition until it holds or the wait budget runs out.
///
/// The condition is evaluated right away and then once after every tick.
/// The deadline is only checked after a sleep, so a condition that is true
/// on the first evaluation always succeeds, and a timeout never fires
/// before the full budget has elapsed.
#[derive(Debug, Clone)]
pub struct WaitForUnit {
    wait: Duration,
    tick: Duration,
    interrupt: Option<CancellationToken>,
}

impl WaitForUnit {
    pub const fn new(wait: Duration) -> Self {
        Self {
            wait,
            tick: DEFAULT_TICK,
            interrupt: None,
        }
    }

    #[must_use]
    pub const fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Cancelling `token` aborts the wait with [`WaitError::Interrupted`].
    #[must_use]
    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = Some(token);
        self
    }

    pub const fn wait(&self) -> Duration {
        self.wait
    }

    pub const fn tick(&self) -> Duration {
        self.tick
    }

    /// Wait for `condition`. Returns the time it took to be met.
    pub async fn start_waiting(&self, condition: &dyn WaitCondition) -> Result<Duration, WaitError> {
        let start = Instant::now();
        let description = condition.tick_message();
        debug!(
            condition = %description,
            wait_ms = millis(self.wait),
            tick_ms = millis(self.tick),
            "waiting for condition"
        );

        loop {
            if condition.is_condition_met().await? {
                let elapsed = start.elapsed();
                debug!(condition = %description, elapsed_ms = millis(elapsed), "condition met");
                return Ok(elapsed);
            }
            trace!(condition = %description, "condition not met yet");

            self.sleep_tick(&description).await?;

            let elapsed = start.elapsed();
            if elapsed > self.wait {
                let err = WaitError::Timeout {
                    description,
                    elapsed_ms: millis(elapsed),
                    budget_ms: millis(self.wait),
                    detail: condition.timeout_message(),
                };
                warn!("{}", err);
                error!(elapsed_ms = millis(elapsed), "wait timed out");
                return Err(err);
            }
        }
    }

    async fn sleep_tick(&self, description: &str) -> Result<(), WaitError> {
        let Some(token) = &self.interrupt else {
            tokio::time::sleep(self.tick).await;
            return Ok(());
        };
        tokio::select! {
            () = token.cancelled() => {
                debug!(condition = %description, "wait interrupted");
                Err(WaitError::Interrupted {
                    description: description.to_string(),
                })
            }
            () = tokio::time::sleep(self.tick) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_immediately_true_returns_without_sleeping() {
        let unit = WaitForUnit::new(Duration::from_secs(5)).with_tick(Duration::from_secs(1));
        let calls = AtomicUsize::new(0);
        let condition = condition_fn("always", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        });

        let elapsed = unit.start_waiting(&condition).await.unwrap();
        assert!(elapsed < Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_on_a_later_tick() {
        let unit = WaitForUnit::new(Duration::from_secs(5)).with_tick(Duration::from_millis(20));
        let calls = AtomicUsize::new(0);
        let condition = condition_fn("third time", || {
            Ok(calls.fetch_add(1, Ordering::SeqCst) >= 2)
        });

        let elapsed = unit.start_waiting(&condition).await.unwrap();
        assert!(elapsed >= Duration::from_millis(40));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_never_fires_before_budget() {
        let wait = Duration::from_millis(100);
        let unit = WaitForUnit::new(wait).with_tick(Duration::from_millis(15));
        let started = std::time::Instant::now();

        let err = unit
            .start_waiting(&condition_fn("never", || Ok(false)))
            .await
            .unwrap_err();

        assert!(started.elapsed() >= wait);
        match err {
            WaitError::Timeout {
                description,
                elapsed_ms,
                budget_ms,
                detail,
            } => {
                assert_eq!(description, "never");
                assert!(elapsed_ms >= 100);
                assert_eq!(budget_ms, 100);
                assert_eq!(detail, "timeout...");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_one_second_budget_times_out_within_a_tick() {
        let unit = WaitForUnit::new(Duration::from_secs(1)).with_tick(Duration::from_millis(100));
        let started = std::time::Instant::now();

        let err = unit
            .start_waiting(&condition_fn("never", || Ok(false)))
            .await
            .unwrap_err();

        let elapsed = started.elapsed();
        assert!(err.is_timeout());
        assert!(elapsed >= Duration::from_millis(1000), "timed out early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1200), "timed out late: {elapsed:?}");
    }

    #[tokio::test]
    async fn test_returns_within_a_tick_of_the_condition_turning_true() {
        let unit = WaitForUnit::new(Duration::from_secs(5)).with_tick(Duration::from_millis(100));
        let ready = Arc::new(AtomicBool::new(false));
        let setter = {
            let ready = ready.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                ready.store(true, Ordering::SeqCst);
            })
        };

        let started = std::time::Instant::now();
        let flag = ready.clone();
        unit.start_waiting(&condition_fn("flag", move || Ok(flag.load(Ordering::SeqCst))))
            .await
            .unwrap();
        let elapsed = started.elapsed();
        setter.await.unwrap();

        assert!(elapsed >= Duration::from_millis(300), "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(450), "returned late: {elapsed:?}");
    }

    #[tokio::test]
    async fn test_predicate_error_propagates_at_once() {
        let unit = WaitForUnit::new(Duration::from_secs(5)).with_tick(Duration::from_secs(1));
        let condition = condition_fn("broken", || {
            Err(WaitError::check("broken", io::Error::other("boom")))
        });

        let started = std::time::Instant::now();
        let err = unit.start_waiting(&condition).await.unwrap_err();
        assert!(matches!(err, WaitError::Check { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_interrupt_during_tick() {
        let token = CancellationToken::new();
        let unit = WaitForUnit::new(Duration::from_secs(30))
            .with_tick(Duration::from_secs(10))
            .with_interrupt(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = unit
            .start_waiting(&condition_fn("port 80", || Ok(false)))
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, WaitError::Interrupted { ref description } if description == "port 80"));
        assert_eq!(err.to_string(), "Interrupted while waiting for port 80");
    }

    #[tokio::test]
    async fn test_default_messages() {
        struct Bare;

        #[async_trait]
        impl WaitCondition for Bare {
            async fn is_condition_met(&self) -> Result<bool, WaitError> {
                Ok(true)
            }
        }

        assert_eq!(Bare.tick_message(), "wait...");
        assert_eq!(Bare.timeout_message(), "timeout...");
        assert_eq!(WaitForUnit::new(Duration::from_secs(1)).tick(), DEFAULT_TICK);
    }
}
