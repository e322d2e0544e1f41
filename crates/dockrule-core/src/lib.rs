//! Core domain types and port definitions for dockrule.
//!
//! This crate holds what the readiness machinery agrees on: the error
//! taxonomy, wait settings and the ports implemented by the runtime crate
//! and by container engine adapters.
#![deny(unused_crate_dependencies)]

pub mod error;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use error::{BoxError, ContainerError, WaitError};
pub use ports::{ContainerControl, ExternalAddress, LineListener, OutputSink, StartConditionCheck};
pub use settings::{
    DEFAULT_HISTORY_LIMIT, DEFAULT_SHUTDOWN_GRACE_MS, DEFAULT_TICK_MS, DEFAULT_WAIT_TIMEOUT_SECS,
    ENV_HISTORY_LIMIT, ENV_SHUTDOWN_GRACE_MS, ENV_WAIT_TICK_MS, ENV_WAIT_TIMEOUT_SECS,
    SettingsError, WaitSettings, validate_settings,
};
