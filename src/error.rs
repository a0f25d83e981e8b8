//! Errors returned by [`Bundle::unpack`](crate::Bundle::unpack) and
//! [`Bundle::run`](crate::Bundle::run).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Exit code reported alongside an error when no child exit status is available.
pub const EXIT_CODE_SENTINEL: i32 = -1;

/// Everything that can go wrong while unpacking or running a bundle. Each variant carries
/// the path (or pid) it was working on and the underlying OS error.
#[derive(Debug, Error)]
pub enum Error {
    /// The unpack root or the parent directory of a file could not be created
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreate { path: PathBuf, source: io::Error },

    /// The payload of a registered file could not be written
    #[error("failed to write file {}: {source}", path.display())]
    FileWrite { path: PathBuf, source: io::Error },

    /// `run` was called on a bundle without an executable entry
    #[error("no executable registered")]
    NoExecutable,

    /// The executable's unpacked location could not be made absolute
    #[error("failed to resolve absolute path of {}: {source}", path.display())]
    PathResolution { path: PathBuf, source: io::Error },

    /// The OS refused to start the child process
    #[error("failed to start executable {}: {source}", path.display())]
    Start { path: PathBuf, source: io::Error },

    /// The OS failed to report the child's termination
    #[error("failed to wait for process {pid}: {source}")]
    Wait { pid: u32, source: io::Error },
}

/// Plain tag for [`Error`], for callers that want to branch on the failure without
/// destructuring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DirectoryCreate,
    FileWrite,
    NoExecutable,
    PathResolution,
    Start,
    Wait,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DirectoryCreate { .. } => ErrorKind::DirectoryCreate,
            Error::FileWrite { .. } => ErrorKind::FileWrite,
            Error::NoExecutable => ErrorKind::NoExecutable,
            Error::PathResolution { .. } => ErrorKind::PathResolution,
            Error::Start { .. } => ErrorKind::Start,
            Error::Wait { .. } => ErrorKind::Wait,
        }
    }

    /// The exit code to report for this failure. Always [`EXIT_CODE_SENTINEL`].
    pub fn exit_code(&self) -> i32 {
        EXIT_CODE_SENTINEL
    }

    /// The OS error behind this failure, if there is one.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Error::DirectoryCreate { source, .. }
            | Error::FileWrite { source, .. }
            | Error::PathResolution { source, .. }
            | Error::Start { source, .. }
            | Error::Wait { source, .. } => Some(source),
            Error::NoExecutable => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_carries_path() {
        let err = Error::FileWrite {
            path: PathBuf::from("unpacked/bin/main.run"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        let msg = err.to_string();
        assert!(msg.contains("unpacked/bin/main.run"), "{}", msg);
        assert_eq!(err.kind(), ErrorKind::FileWrite);
        assert_eq!(err.exit_code(), -1);
    }

    #[test]
    fn test_no_executable_has_no_source() {
        let err = Error::NoExecutable;
        assert!(err.io_error().is_none());
        assert_eq!(err.kind(), ErrorKind::NoExecutable);
        assert_eq!(err.exit_code(), EXIT_CODE_SENTINEL);
    }
}
