//! Readiness checks.
//!
//! Each check implements [`StartConditionCheck`](dockrule_core::StartConditionCheck)
//! and is normally built by a [`StartCondition`](crate::StartCondition).

mod http;
mod log;
mod sequence;
mod tcp;

pub use http::{DEFAULT_HTTP_METHOD, HTTP_PING_TIMEOUT, HttpPingChecker, StatusRange};
pub use log::LogChecker;
pub use sequence::LogSequenceChecker;
pub use tcp::{TCP_PING_TIMEOUT, TcpPortChecker};
