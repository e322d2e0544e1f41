//! CLI-specific error types and mappings.

use dockrule_core::{ContainerError, SettingsError, WaitError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// A condition was not met in time.
    #[error("{0}")]
    NotReady(String),

    /// Waiting was interrupted (Ctrl-C).
    #[error("{0}")]
    Interrupted(String),

    /// A condition could not be evaluated.
    #[error("{0}")]
    Check(String),

    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Process execution error.
    #[error("Process error: {0}")]
    Process(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 1: General error (not ready in time)
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    /// - 130: Terminated by Ctrl-C
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NotReady(_) => 1,
            Self::Arguments(_) => 2,    // EX_USAGE
            Self::Check(_) => 70,       // EX_SOFTWARE
            Self::Process(_) => 71,     // EX_OSERR
            Self::Config(_) => 78,      // EX_CONFIG
            Self::Interrupted(_) => 130,
        }
    }
}

impl From<WaitError> for CliError {
    fn from(err: WaitError) -> Self {
        let message = err.to_string();
        match err {
            WaitError::Timeout { .. } => Self::NotReady(message),
            WaitError::Interrupted { .. } => Self::Interrupted(message),
            e if e.is_configuration() => Self::Config(message),
            WaitError::Container(_) => Self::Process(message),
            _ => Self::Check(message),
        }
    }
}

impl From<ContainerError> for CliError {
    fn from(err: ContainerError) -> Self {
        Self::Process(err.to_string())
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}
