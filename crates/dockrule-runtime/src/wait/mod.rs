//! Wait engine.
//!
//! [`WaitForUnit`] is the polling loop. [`wait_for_condition`] and
//! [`WaitForContainer`] drive it with start condition checks, and
//! [`wait_any`] races several checks against one budget.

mod any;
mod container;
mod unit;

pub use any::{ANY_RETRY_INTERVAL, DEFAULT_ANY_MAX_WAIT, wait_any};
pub use container::{WaitForContainer, wait_for_condition};
pub use unit::{DEFAULT_TICK, FnCondition, WaitCondition, WaitForUnit, condition_fn};

/// Whole milliseconds, saturating.
pub(crate) fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
