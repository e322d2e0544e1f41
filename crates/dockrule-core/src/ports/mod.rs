//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the wait engine and the log multiplexer
//! expect from their surroundings. They contain no implementation details.
//!
//! # Design Rules
//!
//! - Container access goes through [`ContainerControl`] only
//! - Checks report "not ready" as `Ok(false)`, never as an error
//! - Cleanup hooks never fail

pub mod container;
pub mod line_listener;
pub mod start_condition;

pub use container::{ContainerControl, ExternalAddress, OutputSink};
pub use line_listener::LineListener;
pub use start_condition::StartConditionCheck;
