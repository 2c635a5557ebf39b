use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("could not append to event log {}: {source}", path.display())]
pub struct LogError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Operator-facing trail of state-relevant transitions.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EventLog: std::fmt::Debug + Send + Sync {
    async fn record(&self, message: &str) -> Result<(), LogError>;
}
