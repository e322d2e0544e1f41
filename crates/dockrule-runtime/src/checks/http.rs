//! HTTP status ping.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use dockrule_core::{StartConditionCheck, WaitError};
use regex::Regex;
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Url};
use tracing::trace;

/// Connect and response timeout for a single ping.
pub const HTTP_PING_TIMEOUT: Duration = Duration::from_millis(500);

pub const DEFAULT_HTTP_METHOD: &str = "HEAD";

static STATUS_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*\.\.+\s*(\d+)$").expect("status range pattern is a valid regex")
});

/// Inclusive range of accepted HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRange {
    pub min: u16,
    pub max: u16,
}

impl StatusRange {
    /// Any 2xx or 3xx status.
    pub const DEFAULT: Self = Self { min: 200, max: 399 };

    pub const fn single(status: u16) -> Self {
        Self {
            min: status,
            max: status,
        }
    }

    pub const fn contains(self, status: u16) -> bool {
        status >= self.min && status <= self.max
    }
}

impl Default for StatusRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for StatusRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}..{}", self.min, self.max)
        }
    }
}

impl FromStr for StatusRange {
    type Err = WaitError;

    /// Parses `"302"` or `"200..302"` (any number of dots, optional spaces).
    /// A range whose lower bound exceeds its upper bound is rejected.
    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        let invalid = || WaitError::InvalidStatusPattern(pattern.to_string());

        if let Some(caps) = STATUS_RANGE.captures(pattern) {
            let min: u16 = caps[1].parse().map_err(|_| invalid())?;
            let max: u16 = caps[2].parse().map_err(|_| invalid())?;
            if min > max {
                return Err(invalid());
            }
            return Ok(Self { min, max });
        }
        pattern.trim().parse().map(Self::single).map_err(|_| invalid())
    }
}

/// Met once `url` answers with a status inside the accepted range.
///
/// Every check sends exactly one request with a fresh client: no retries,
/// no pooled connections, no redirect following. Transport failures and
/// statuses outside the range mean "not ready yet". A `501` means the
/// method itself is unsupported and fails the wait.
#[derive(Debug, Clone)]
pub struct HttpPingChecker {
    url: Url,
    method: Method,
    status: StatusRange,
    timeout: Duration,
}

impl HttpPingChecker {
    /// Ping `url` with `HEAD`, accepting any 2xx or 3xx status.
    pub fn new(url: &str) -> Result<Self, WaitError> {
        Self::with_options(url, None, None)
    }

    /// Ping `url` with an optional method and status pattern.
    pub fn with_options(
        url: &str,
        method: Option<&str>,
        status_pattern: Option<&str>,
    ) -> Result<Self, WaitError> {
        let parsed = Url::parse(url).map_err(|e| WaitError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let method = method.unwrap_or(DEFAULT_HTTP_METHOD).to_uppercase();
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| WaitError::InvalidMethod(method.clone()))?;

        let status = status_pattern
            .map(StatusRange::from_str)
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            url: parsed,
            method,
            status,
            timeout: HTTP_PING_TIMEOUT,
        })
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub const fn status(&self) -> StatusRange {
        self.status
    }

    fn client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .redirect(Policy::none())
            .pool_max_idle_per_host(0)
            .build()
    }
}

#[async_trait]
impl StartConditionCheck for HttpPingChecker {
    async fn check(&self) -> Result<bool, WaitError> {
        let client = self
            .client()
            .map_err(|e| WaitError::check(self.describe(), e))?;

        match client
            .request(self.method.clone(), self.url.clone())
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status().as_u16();
                if status == 501 {
                    return Err(WaitError::UnsupportedMethod {
                        method: self.method.to_string(),
                        url: self.url.to_string(),
                    });
                }
                let accepted = self.status.contains(status);
                trace!(url = %self.url, status, accepted, "http ping response");
                Ok(accepted)
            }
            Err(e) => {
                trace!(url = %self.url, error = %e, "http ping failed");
                Ok(false)
            }
        }
    }

    fn describe(&self) -> String {
        format!("http ping to '{}' with method '{}'", self.url, self.method)
    }
}
