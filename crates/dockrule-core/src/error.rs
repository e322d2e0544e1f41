//! Error types for readiness waiting and container access.
//!
//! `WaitError` is the single error type surfaced by the wait engine and by
//! every condition check. Variants are grouped by how callers are expected to
//! react: timeouts and configuration mistakes are asserted on, interruption
//! and check failures indicate a bug in the environment and surface loudly.

use thiserror::Error;

/// Boxed error used as the source of a failed condition evaluation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the external container collaborator.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The internal port has no external mapping.
    #[error("Port {0} is not exposed")]
    PortNotExposed(u16),

    /// Attaching to the container output failed.
    #[error("Failed to attach to output: {0}")]
    Attach(String),

    /// Reading the accumulated container log failed.
    #[error("Failed to read log: {0}")]
    Logs(String),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while waiting for a readiness condition.
#[derive(Debug, Error)]
pub enum WaitError {
    // === Expiry ===
    /// The deadline passed before the condition was met.
    #[error("Condition [{description}] was not met for [{elapsed_ms}/{budget_ms}]ms, {detail}")]
    Timeout {
        description: String,
        elapsed_ms: u64,
        budget_ms: u64,
        detail: String,
    },

    /// The waiting task was interrupted between ticks.
    #[error("Interrupted while waiting for {description}")]
    Interrupted { description: String },

    // === Evaluation ===
    /// The predicate itself failed. Never retried.
    #[error("Check '{description}' failed: {source}")]
    Check {
        description: String,
        #[source]
        source: BoxError,
    },

    // === Configuration ===
    /// The server answered 501 for the configured ping method.
    #[error("Invalid or not supported HTTP method '{method}' for checking {url}")]
    UnsupportedMethod { method: String, url: String },

    /// The ping method is not a valid HTTP token.
    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    /// The ping URL does not parse.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The status pattern is neither a number nor a `min..max` range.
    #[error("Invalid status pattern '{0}', expected e.g. '200' or '200..399'")]
    InvalidStatusPattern(String),

    // === Collaborator ===
    /// Container access failed.
    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl WaitError {
    /// Wrap any error raised while evaluating a condition.
    pub fn check(description: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Check {
            description: description.into(),
            source: source.into(),
        }
    }

    /// Whether the wait expired without the condition being met.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the error signals a configuration mistake rather than a
    /// not-yet-ready target.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMethod { .. }
                | Self::InvalidMethod(_)
                | Self::InvalidUrl { .. }
                | Self::InvalidStatusPattern(_)
                | Self::Container(ContainerError::PortNotExposed(_))
        )
    }
}
