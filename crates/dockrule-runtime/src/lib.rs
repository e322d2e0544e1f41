//! Runtime for dockrule: log multiplexing, readiness checks and the wait
//! engine, built on tokio.
//!
//! Typical flow against a running container:
//!
//! 1. [`LogCapture::start`] attaches to the container output and fans it
//!    out to stdout, stderr and a combined line feed
//! 2. [`WaitForContainer`] builds each [`StartCondition`] against the
//!    container and that feed, then polls it until met or timed out
//! 3. [`LogCapture::close`] detaches once the test is done
#![deny(unsafe_code)]

pub mod checks;
pub mod conditions;
pub mod logs;
pub mod process;
pub mod wait;

#[cfg(test)]
mod test_support;

pub use checks::{HttpPingChecker, LogChecker, LogSequenceChecker, StatusRange, TcpPortChecker};
pub use conditions::{ConditionContext, StartCondition};
pub use logs::{
    CaptureOptions, LineListenerProxy, LineOutput, LogCapture, LogPrinter, LogSplitter, LogStream,
};
pub use process::{LocalProcess, PortMap};
pub use wait::{WaitCondition, WaitForContainer, WaitForUnit, wait_any, wait_for_condition};
