//! Ordered log message sequence.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dockrule_core::{LineListener, StartConditionCheck, WaitError};
use tracing::{info, trace};

/// Met once every expected substring has been seen, in order, each on a
/// later line than the previous one.
///
/// Fed through [`LineListener`]. A line only ever advances the cursor by
/// one and only when it contains the substring the cursor points at; there
/// is no backtracking.
#[derive(Debug)]
pub struct LogSequenceChecker {
    sequence: Vec<String>,
    cursor: AtomicUsize,
}

impl LogSequenceChecker {
    pub fn new<I, S>(sequence: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sequence: sequence.into_iter().map(Into::into).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn sequence(&self) -> &[String] {
        &self.sequence
    }

    /// Number of steps matched so far.
    pub fn matched(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }
}

impl LineListener for LogSequenceChecker {
    fn next_line(&self, line: &str) {
        let index = self.cursor.load(Ordering::Acquire);
        let Some(expected) = self.sequence.get(index) else {
            return;
        };

        if !line.contains(expected.as_str()) {
            trace!(index, expected = %expected, "log sequence step not matched: {}", line);
            return;
        }

        // A racing line may have advanced the cursor already.
        if self
            .cursor
            .compare_exchange(index, index + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!(
                index,
                total = self.sequence.len(),
                "log sequence step matched: '{}'",
                expected
            );
        }
    }
}

#[async_trait]
impl StartConditionCheck for LogSequenceChecker {
    async fn check(&self) -> Result<bool, WaitError> {
        Ok(self.matched() >= self.sequence.len())
    }

    fn describe(&self) -> String {
        format!("log sequence [{}]", self.sequence.join(", "))
    }
}
