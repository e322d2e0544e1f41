//! Start condition check port.
//!
//! A check is the runtime half of a readiness condition: it is created once
//! the container is running and then polled by the wait engine.

use async_trait::async_trait;

use crate::error::WaitError;

/// Container startup condition check.
#[async_trait]
pub trait StartConditionCheck: Send + Sync {
    /// Is the condition fulfilled?
    ///
    /// `Ok(false)` means "not ready yet" and the wait engine will ask again
    /// on the next tick. An `Err` stops waiting immediately.
    async fn check(&self) -> Result<bool, WaitError>;

    /// Condition description, shown in log messages and timeout errors.
    fn describe(&self) -> String;

    /// Cleanup after waiting finished, successfully or not.
    fn after(&self) {}
}
