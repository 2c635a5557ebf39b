use std::sync::{Mutex, PoisonError};

use crate::core::traits::event_log::{EventLog, LogError};

/// Keeps recorded lines in memory, without timestamps.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl EventLog for MemoryEventLog {
    async fn record(&self, message: &str) -> Result<(), LogError> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
        Ok(())
    }
}
