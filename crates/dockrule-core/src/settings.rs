//! Wait and capture settings.
//!
//! Pure configuration types with defaults. Values can be overridden from
//! environment variables through [`WaitSettings::from_env`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default time budget for a readiness condition.
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 30;

/// Default interval between two condition checks.
pub const DEFAULT_TICK_MS: u64 = 1000;

/// Default time given to log workers to finish on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 1000;

/// Default number of log lines replayed to late listeners.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

pub const ENV_WAIT_TIMEOUT_SECS: &str = "DOCKRULE_WAIT_TIMEOUT_SECS";
pub const ENV_WAIT_TICK_MS: &str = "DOCKRULE_WAIT_TICK_MS";
pub const ENV_SHUTDOWN_GRACE_MS: &str = "DOCKRULE_SHUTDOWN_GRACE_MS";
pub const ENV_HISTORY_LIMIT: &str = "DOCKRULE_HISTORY_LIMIT";

/// Errors produced while loading or validating settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid value '{value}' for {key}: expected a non-negative integer")]
    InvalidValue { key: String, value: String },

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),
}

/// Settings shared by the wait engine and log capture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WaitSettings {
    /// Time budget for each readiness condition, in seconds.
    pub timeout_secs: u64,

    /// Interval between condition checks, in milliseconds.
    pub tick_ms: u64,

    /// How long closing a capture waits for its workers, in milliseconds.
    pub shutdown_grace_ms: u64,

    /// Number of recent log lines replayed to late listeners.
    pub history_limit: usize,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl WaitSettings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
            tick_ms: DEFAULT_TICK_MS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Load defaults overridden by `DOCKRULE_*` environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load defaults overridden by values from an arbitrary lookup.
    ///
    /// Blank values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::with_defaults();

        if let Some(v) = parse_override(&lookup, ENV_WAIT_TIMEOUT_SECS)? {
            settings.timeout_secs = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_WAIT_TICK_MS)? {
            settings.tick_ms = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_SHUTDOWN_GRACE_MS)? {
            settings.shutdown_grace_ms = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_HISTORY_LIMIT)? {
            settings.history_limit = v;
        }

        validate_settings(&settings)?;
        Ok(settings)
    }

    /// Set the timeout in whole seconds.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the tick interval.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick_ms = u64::try_from(tick.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn parse_override<F, T>(lookup: &F, key: &str) -> Result<Option<T>, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = trimmed.parse().map_err(|_| SettingsError::InvalidValue {
        key: key.to_string(),
        value: raw.clone(),
    })?;
    debug!(%key, value = %trimmed, "Applied settings override");
    Ok(Some(value))
}

/// Validate settings values.
pub const fn validate_settings(settings: &WaitSettings) -> Result<(), SettingsError> {
    if settings.timeout_secs == 0 {
        return Err(SettingsError::MustBePositive("timeout_secs"));
    }
    if settings.tick_ms == 0 {
        return Err(SettingsError::MustBePositive("tick_ms"));
    }
    Ok(())
}
