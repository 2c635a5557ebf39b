use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DuplicateError {
    #[error("could not locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("could not spawn a duplicate of {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplication {
    Spawned { pid: Option<u32> },
    /// This instance already is a duplicate.
    Skipped,
}

/// Starts an independent copy of the running worker.
///
/// The copy shares no memory or state with its origin and runs the same
/// startup path from the beginning.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Duplicator: std::fmt::Debug + Send + Sync {
    async fn duplicate(&self) -> Result<Duplication, DuplicateError>;
}
