use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::constants::{DEFAULT_LOG_FILE, LOG_FILE_ENV, LOG_TIMESTAMP_FORMAT};
use crate::core::traits::event_log::{EventLog, LogError};

/// Appends `<timestamp>: <message>` lines to a plain text file shared by
/// every worker on the host.
#[derive(Clone, Debug)]
pub struct FileEventLog {
    path: PathBuf,
}

impl FileEventLog {
    pub fn new<T: AsRef<Path>>(path: T) -> Self {
        Self {
            path: path.as_ref().into(),
        }
    }

    /// Uses `MEMSTRESS_LOG_FILE` when set, `process_log.txt` otherwise.
    pub fn from_env() -> Self {
        match std::env::var_os(LOG_FILE_ENV) {
            Some(path) if !path.is_empty() => Self::new(path),
            _ => Self::new(DEFAULT_LOG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        // One write per line so concurrent appenders do not interleave.
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait::async_trait]
impl EventLog for FileEventLog {
    async fn record(&self, message: &str) -> Result<(), LogError> {
        let line = format!("{}: {}\n", Local::now().format(LOG_TIMESTAMP_FORMAT), message);

        self.append(&line).await.map_err(|source| LogError {
            path: self.path.clone(),
            source,
        })
    }
}
