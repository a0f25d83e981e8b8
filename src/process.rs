//! Pid-based process handle and wait status decoding, modelled on
//! <https://github.com/rust-lang/rust/blob/master/library/std/src/sys/unix/process/process_unix.rs>

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::io::{Error, ErrorKind, Result};

use libc::{c_int, pid_t};
use nix::{
    sys::signal::{kill, Signal},
    unistd::Pid,
};

use crate::sys::cvt_r;

pub struct Process {
    pid: pid_t,
    // cached once reaped, so later waits don't touch a recycled pid
    status: Option<ExitStatus>,
}

impl Process {
    /// # Safety
    ///
    /// `pid` must be a child of this process that nobody else will reap.
    pub unsafe fn new(pid: pid_t) -> Self {
        Process { pid, status: None }
    }

    pub fn id(&self) -> u32 {
        self.pid as u32
    }

    pub fn kill(&mut self) -> Result<()> {
        if self.status.is_some() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "invalid argument: can't kill an exited process",
            ));
        }
        kill(Pid::from_raw(self.pid), Signal::SIGKILL).map_err(Error::from)
    }

    pub fn wait(&mut self) -> Result<ExitStatus> {
        self.reap(0)?
            .ok_or_else(|| Error::new(ErrorKind::Other, "waitpid returned without a status"))
    }

    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        self.reap(libc::WNOHANG)
    }

    /// `waitpid` with `flags`. `None` means the child is still running (`WNOHANG` only).
    fn reap(&mut self, flags: c_int) -> Result<Option<ExitStatus>> {
        if self.status.is_some() {
            return Ok(self.status);
        }
        let mut raw: c_int = 0;
        let reaped = cvt_r(|| unsafe { libc::waitpid(self.pid, &mut raw, flags) })?;
        if reaped == 0 {
            return Ok(None);
        }
        self.status = Some(ExitStatus::new(raw));
        Ok(self.status)
    }
}

/// Termination status of the executable, as reported by `waitpid`.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct ExitStatus(c_int);

impl Debug for ExitStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_tuple("unix_wait_status").field(&self.0).finish()
    }
}

impl Display for ExitStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match (self.code(), self.signal()) {
            (Some(code), _) => write!(f, "exit status: {}", code),
            (None, Some(signal)) if self.core_dumped() => {
                write!(f, "signal: {} (core dumped)", signal)
            }
            (None, Some(signal)) => write!(f, "signal: {}", signal),
            (None, None) => write!(f, "unrecognised wait status: {}", self.0),
        }
    }
}

impl ExitStatus {
    pub fn new(status: c_int) -> ExitStatus {
        ExitStatus(status)
    }

    /// Whether the process exited normally with code 0.
    pub fn success(&self) -> bool {
        self.code() == Some(0)
    }

    /// The exit code, if the process exited normally.
    pub fn code(&self) -> Option<i32> {
        libc::WIFEXITED(self.0).then(|| libc::WEXITSTATUS(self.0))
    }

    /// The terminating signal, if the process was killed by one.
    pub fn signal(&self) -> Option<i32> {
        libc::WIFSIGNALED(self.0).then(|| libc::WTERMSIG(self.0))
    }

    pub fn core_dumped(&self) -> bool {
        libc::WIFSIGNALED(self.0) && libc::WCOREDUMP(self.0)
    }

    /// The status as a single integer: the exit code for a normal exit, `128 + signal`
    /// for a process killed by a signal (the shell's convention).
    pub fn exit_code(&self) -> i32 {
        match (self.code(), self.signal()) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => self.0,
        }
    }

    pub fn into_raw(&self) -> c_int {
        self.0
    }
}

impl From<c_int> for ExitStatus {
    fn from(a: c_int) -> ExitStatus {
        ExitStatus(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_exit() {
        // WEXITSTATUS lives in the second byte
        let status = ExitStatus::new(3 << 8);
        assert_eq!(status.code(), Some(3));
        assert_eq!(status.signal(), None);
        assert_eq!(status.exit_code(), 3);
        assert!(!status.success());
        assert_eq!(status.to_string(), "exit status: 3");
    }

    #[test]
    fn test_killed_by_signal() {
        let status = ExitStatus::new(libc::SIGKILL);
        assert_eq!(status.code(), None);
        assert_eq!(status.signal(), Some(libc::SIGKILL));
        assert_eq!(status.exit_code(), 128 + libc::SIGKILL);
        assert!(!status.core_dumped());
    }

    #[test]
    fn test_status_is_cached_after_reaping() {
        let pid = unsafe { libc::fork() };
        assert!(pid >= 0);
        if pid == 0 {
            unsafe { libc::_exit(5) }
        }

        let mut p = unsafe { Process::new(pid) };
        let status = p.wait().unwrap();
        assert_eq!(status.code(), Some(5));
        // a second waitpid would fail with ECHILD; the cached status answers instead
        assert_eq!(p.wait().unwrap(), status);
        assert_eq!(p.try_wait().unwrap(), Some(status));
        assert!(p.kill().is_err());
    }

    #[test]
    fn test_zero_is_success() {
        assert!(ExitStatus::from(0).success());
    }
}
