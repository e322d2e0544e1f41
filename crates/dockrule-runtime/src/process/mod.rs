//! Local process collaborator.
//!
//! Lets the log multiplexer and the wait engine run against a plain child
//! process instead of a container.

mod local;
mod ports;
mod shutdown;

pub use local::{DEFAULT_STOP_GRACE, LOCAL_HOST, LocalProcess};
pub use ports::PortMap;
pub use shutdown::stop_child;
