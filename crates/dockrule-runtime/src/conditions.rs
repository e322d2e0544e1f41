//! Start condition descriptors.
//!
//! A [`StartCondition`] is declared before the container runs and turned
//! into a [`StartConditionCheck`] once it does, against a
//! [`ConditionContext`] that knows the container and its live log feed.

use std::fmt;
use std::sync::Arc;

use dockrule_core::{ContainerControl, StartConditionCheck, WaitError};
use tracing::debug;

use crate::checks::{HttpPingChecker, LogChecker, LogSequenceChecker, TcpPortChecker};
use crate::logs::{LineListenerProxy, LogCapture};

/// What a condition needs from the running container.
#[derive(Clone)]
pub struct ConditionContext {
    pub container: Arc<dyn ContainerControl>,
    pub lines: Arc<LineListenerProxy>,
}

impl ConditionContext {
    pub const fn new(container: Arc<dyn ContainerControl>, lines: Arc<LineListenerProxy>) -> Self {
        Self { container, lines }
    }

    /// Context whose log feed is `capture`'s combined stream.
    pub fn from_capture(container: Arc<dyn ContainerControl>, capture: &LogCapture) -> Self {
        Self::new(container, capture.lines())
    }
}

type BuildFn =
    dyn Fn(&ConditionContext) -> Result<Arc<dyn StartConditionCheck>, WaitError> + Send + Sync;

/// Factory for a [`StartConditionCheck`].
#[derive(Clone)]
pub struct StartCondition {
    label: String,
    build: Arc<BuildFn>,
}

impl fmt::Debug for StartCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartCondition")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl StartCondition {
    /// Custom condition built by `build`.
    pub fn new<F>(label: impl Into<String>, build: F) -> Self
    where
        F: Fn(&ConditionContext) -> Result<Arc<dyn StartConditionCheck>, WaitError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            label: label.into(),
            build: Arc::new(build),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Create the check for the container in `ctx`.
    pub fn build(&self, ctx: &ConditionContext) -> Result<Arc<dyn StartConditionCheck>, WaitError> {
        (self.build)(ctx)
    }

    /// Wait for `message` anywhere in the full log.
    ///
    /// The whole log since start is searched, so this works regardless of
    /// when waiting begins.
    pub fn log_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(format!("log message '{message}'"), move |ctx| {
            debug!(message = %message, "new wait for condition - log message");
            Ok(Arc::new(LogChecker::new(ctx.container.clone(), message.clone())))
        })
    }

    /// Wait for `messages` to appear in order, each on a later line.
    ///
    /// The checker listens on the combined log feed; lines already in its
    /// history are replayed, so output printed before the wait started
    /// still counts.
    pub fn log_message_sequence<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let messages: Vec<String> = messages.into_iter().map(Into::into).collect();
        Self::new(format!("log sequence [{}]", messages.join(", ")), move |ctx| {
            debug!(messages = ?messages, "new wait for condition - log sequence");
            let checker = Arc::new(LogSequenceChecker::new(messages.clone()));
            ctx.lines.add(checker.clone());
            Ok(checker)
        })
    }

    /// Wait until every internal port accepts TCP connections on its
    /// external address.
    ///
    /// Ports are resolved when the check is built; an unexposed port fails
    /// right there.
    pub fn tcp_port(internal_ports: &[u16]) -> Self {
        let internal_ports = internal_ports.to_vec();
        Self::new(format!("tcp port(s) {internal_ports:?}"), move |ctx| {
            let external = internal_ports
                .iter()
                .map(|port| ctx.container.resolve_external_address(*port))
                .collect::<Result<Vec<_>, _>>()?;
            debug!(
                internal = ?internal_ports,
                external = ?external,
                "new wait for condition - tcp port(s) open"
            );
            Ok(Arc::new(TcpPortChecker::new(external)))
        })
    }

    /// Wait until `http://{host}:{port}/` answers `HEAD` with 2xx or 3xx.
    pub fn http_ping(internal_port: u16) -> Self {
        Self::http_ping_with(internal_port, None, None)
    }

    /// [`http_ping`](Self::http_ping) with a custom method and status
    /// pattern (`"302"` or `"200..302"`).
    pub fn http_ping_with(
        internal_port: u16,
        method: Option<&str>,
        status_pattern: Option<&str>,
    ) -> Self {
        let method = method.map(str::to_string);
        let status_pattern = status_pattern.map(str::to_string);
        Self::new(format!("http ping port {internal_port}"), move |ctx| {
            let address = ctx.container.resolve_external_address(internal_port)?;
            let url = format!("http://{}:{}/", address.host, address.port);
            debug!(port = internal_port, url = %url, "new wait for condition - http ping");
            let checker =
                HttpPingChecker::with_options(&url, method.as_deref(), status_pattern.as_deref())?;
            Ok(Arc::new(checker))
        })
    }
}
