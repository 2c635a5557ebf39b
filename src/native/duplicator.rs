use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::constants::DUPLICATE_ENV;
use crate::core::traits::duplicator::{DuplicateError, Duplication, Duplicator};

/// Re-executes a program with the same arguments as a detached sibling.
///
/// The child is marked through `MEMSTRESS_DUPLICATE` so it does not
/// duplicate again.
#[derive(Clone, Debug)]
pub struct ProcessDuplicator {
    /// `None` means the running executable, resolved at spawn time.
    program: Option<PathBuf>,
    args: Vec<OsString>,
    already_duplicate: bool,
}

impl ProcessDuplicator {
    pub fn new<T: AsRef<Path>>(program: T, args: Vec<OsString>) -> Self {
        Self {
            program: Some(program.as_ref().into()),
            args,
            already_duplicate: false,
        }
    }

    pub fn for_current_process() -> Self {
        Self {
            program: None,
            args: std::env::args_os().skip(1).collect(),
            already_duplicate: std::env::var_os(DUPLICATE_ENV).is_some(),
        }
    }

    pub fn already_duplicate(self, already_duplicate: bool) -> Self {
        Self {
            already_duplicate,
            ..self
        }
    }
}

#[async_trait::async_trait]
impl Duplicator for ProcessDuplicator {
    #[tracing::instrument]
    async fn duplicate(&self) -> Result<Duplication, DuplicateError> {
        if self.already_duplicate {
            tracing::debug!("Running as a duplicate, not spawning another");
            return Ok(Duplication::Skipped);
        }

        let program = match &self.program {
            Some(program) => program.clone(),
            None => std::env::current_exe().map_err(DuplicateError::CurrentExe)?,
        };

        let child = Command::new(&program)
            .args(&self.args)
            .env(DUPLICATE_ENV, "1")
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| DuplicateError::Spawn { program, source })?;

        let pid = child.id();
        tracing::info!("Spawned duplicate process: {:?}", pid);
        Ok(Duplication::Spawned { pid })
    }
}
