//! Wait for the first of several checks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dockrule_core::{StartConditionCheck, WaitError};

use super::unit::{WaitCondition, WaitForUnit};

/// Default budget for [`wait_any`].
pub const DEFAULT_ANY_MAX_WAIT: Duration = Duration::from_secs(10);

/// Polling interval for [`wait_any`].
pub const ANY_RETRY_INTERVAL: Duration = Duration::from_millis(500);

struct AfterAll<'a>(&'a [Arc<dyn StartConditionCheck>]);

impl Drop for AfterAll<'_> {
    fn drop(&mut self) {
        for check in self.0 {
            check.after();
        }
    }
}

struct AnyOf<'a>(&'a [Arc<dyn StartConditionCheck>]);

#[async_trait]
impl<'a> WaitCondition for AnyOf<'a> {
    async fn is_condition_met(&self) -> Result<bool, WaitError> {
        for check in self.0 {
            if check.check().await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn tick_message(&self) -> String {
        let descriptions: Vec<String> = self.0.iter().map(|c| c.describe()).collect();
        format!("any of [{}]", descriptions.join(", "))
    }

    fn timeout_message(&self) -> String {
        "No checker finished successfully".to_string()
    }
}

/// Succeed as soon as any of `checks` is met.
///
/// Checks are polled in order every [`ANY_RETRY_INTERVAL`] for at most
/// `max_wait` (default [`DEFAULT_ANY_MAX_WAIT`]). An empty list never
/// succeeds. `after()` runs on every check however waiting ends.
pub async fn wait_any(
    checks: &[Arc<dyn StartConditionCheck>],
    max_wait: Option<Duration>,
) -> Result<Duration, WaitError> {
    let _after = AfterAll(checks);
    WaitForUnit::new(max_wait.unwrap_or(DEFAULT_ANY_MAX_WAIT))
        .with_tick(ANY_RETRY_INTERVAL)
        .start_waiting(&AnyOf(checks))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Flag {
        met: AtomicBool,
        afters: AtomicUsize,
    }

    #[async_trait]
    impl StartConditionCheck for Flag {
        async fn check(&self) -> Result<bool, WaitError> {
            Ok(self.met.load(Ordering::SeqCst))
        }

        fn describe(&self) -> String {
            "flag".to_string()
        }

        fn after(&self) {
            self.afters.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_any_met_check_is_enough() {
        let slow = Arc::new(Flag::default());
        let ready = Arc::new(Flag::default());
        ready.met.store(true, Ordering::SeqCst);

        let checks: Vec<Arc<dyn StartConditionCheck>> = vec![slow.clone(), ready.clone()];
        let elapsed = wait_any(&checks, None).await.unwrap();

        assert!(elapsed < ANY_RETRY_INTERVAL);
        assert_eq!(slow.afters.load(Ordering::SeqCst), 1);
        assert_eq!(ready.afters.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_met_times_out() {
        let never = Arc::new(Flag::default());
        let checks: Vec<Arc<dyn StartConditionCheck>> = vec![never.clone()];

        let err = wait_any(&checks, Some(Duration::from_millis(600)))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().ends_with("No checker finished successfully"));
        assert_eq!(never.afters.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_check_becoming_met_later() {
        let flag = Arc::new(Flag::default());
        let checks: Vec<Arc<dyn StartConditionCheck>> = vec![flag.clone()];

        let setter = {
            let flag = flag.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                flag.met.store(true, Ordering::SeqCst);
            })
        };

        let elapsed = wait_any(&checks, Some(Duration::from_secs(5))).await.unwrap();
        setter.await.unwrap();
        assert!(elapsed >= ANY_RETRY_INTERVAL);
    }
}
