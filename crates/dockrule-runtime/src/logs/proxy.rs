//! Line fan-out with history replay.
//!
//! [`LineListenerProxy`] passes every line to a dynamic set of listeners and
//! remembers the most recent lines, so that a listener registered later
//! first receives what it missed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dockrule_core::{DEFAULT_HISTORY_LIMIT, LineListener};

#[derive(Default)]
struct ProxyState {
    history: VecDeque<String>,
    listeners: Vec<Arc<dyn LineListener>>,
}

/// [`LineListener`] that proxies lines to registered listeners and replays
/// up to `history_limit` past lines to listeners registered late.
///
/// Registration and delivery share one lock: a line arriving while a
/// listener is being added reaches that listener exactly once, either in
/// the replay or live. Listeners are called with the lock held and must not
/// call back into the proxy.
pub struct LineListenerProxy {
    history_limit: usize,
    state: Mutex<ProxyState>,
}

impl LineListenerProxy {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            history_limit,
            state: Mutex::new(ProxyState {
                history: VecDeque::with_capacity(history_limit.min(DEFAULT_HISTORY_LIMIT)),
                listeners: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ProxyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replay history to `listener`, then register it.
    pub fn add(&self, listener: Arc<dyn LineListener>) {
        let mut state = self.state();
        for line in &state.history {
            listener.next_line(line);
        }
        state.listeners.push(listener);
    }

    /// Replay history to every new listener, then register them all.
    pub fn add_all(&self, listeners: impl IntoIterator<Item = Arc<dyn LineListener>>) {
        let listeners: Vec<_> = listeners.into_iter().collect();
        let mut state = self.state();
        for line in &state.history {
            for listener in &listeners {
                listener.next_line(line);
            }
        }
        state.listeners.extend(listeners);
    }

    pub const fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Lines currently available for replay, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.state().history.iter().cloned().collect()
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }
}

impl Default for LineListenerProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl LineListener for LineListenerProxy {
    fn next_line(&self, line: &str) {
        let mut state = self.state();
        if self.history_limit > 0 {
            if state.history.len() >= self.history_limit {
                state.history.pop_front();
            }
            state.history.push_back(line.to_string());
        }
        for listener in &state.listeners {
            listener.next_line(line);
        }
    }
}
