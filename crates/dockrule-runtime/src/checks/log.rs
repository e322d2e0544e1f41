//! Substring search over the accumulated container log.

use std::sync::Arc;

use async_trait::async_trait;
use dockrule_core::{ContainerControl, StartConditionCheck, WaitError};

/// Met once the full log contains `message` (case-sensitive, anywhere).
pub struct LogChecker {
    container: Arc<dyn ContainerControl>,
    message: String,
}

impl LogChecker {
    pub fn new(container: Arc<dyn ContainerControl>, message: impl Into<String>) -> Self {
        Self {
            container,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[async_trait]
impl StartConditionCheck for LogChecker {
    async fn check(&self) -> Result<bool, WaitError> {
        let log = self.container.full_log().await?;
        Ok(log.contains(&self.message))
    }

    fn describe(&self) -> String {
        format!("log message '{}'", self.message)
    }
}
