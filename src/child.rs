use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::process::{ExitStatus, Process};

/// A running executable started by [`Bundle::spawn`](crate::Bundle::spawn). Its standard
/// streams are the parent's own.
pub struct Child {
    handle: Process,
    program: PathBuf,
}

impl Child {
    pub(crate) fn new(handle: Process, program: PathBuf) -> Self {
        Self { handle, program }
    }

    /// Kill the child process
    pub fn kill(&mut self) -> io::Result<()> {
        self.handle.kill()
    }

    /// Return the id of the child process, probably a PID
    pub fn id(&self) -> u32 {
        self.handle.id()
    }

    /// Absolute path of the executable this child was started from
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Block until the child exits. There is no timeout.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        let status = self.handle.wait().map_err(|source| Error::Wait {
            pid: self.id(),
            source,
        })?;
        info!(pid = self.id(), %status, "executable exited");
        Ok(status)
    }

    /// Check whether the child has exited without blocking
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        self.handle.try_wait().map_err(|source| Error::Wait {
            pid: self.id(),
            source,
        })
    }
}

impl Debug for Child {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Child")
            .field("pid", &self.id())
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}
