//! Container control port.
//!
//! This port abstracts the container engine. The readiness machinery only
//! needs three things from it: the live output channels, a snapshot of the
//! accumulated log, and the external address of an internal port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::AsyncWrite;

use crate::error::ContainerError;

/// Owned byte sink bound to one of the container's output channels.
pub type OutputSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Externally reachable address of a container port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalAddress {
    /// Host name or IP address the port is published on.
    pub host: String,
    /// Published port number.
    pub port: u16,
}

impl ExternalAddress {
    /// Create a new external address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ExternalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Port for the running container the readiness checks observe.
///
/// Implementations should be thread-safe; `attach_output` runs on its own
/// task while checks call the other methods concurrently.
#[async_trait]
pub trait ContainerControl: Send + Sync {
    /// Short identity used in log prefixes and timeout messages.
    fn describe(&self) -> String;

    /// Stream the container's stdout and stderr into the given sinks.
    ///
    /// Returns when the container output ends or a sink rejects a write
    /// because it was closed. Sinks are dropped on return, which flushes
    /// any trailing partial line.
    async fn attach_output(
        &self,
        stdout: OutputSink,
        stderr: OutputSink,
    ) -> Result<(), ContainerError>;

    /// Everything the container emitted so far, both channels.
    async fn full_log(&self) -> Result<String, ContainerError>;

    /// Map an internal port to its externally reachable address.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::PortNotExposed`] when the port has no mapping.
    fn resolve_external_address(&self, internal_port: u16)
    -> Result<ExternalAddress, ContainerError>;
}
