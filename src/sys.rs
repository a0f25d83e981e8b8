//! Thin helpers over the raw syscalls used to start a child: return value conversion
//! in the style of std's `sys::unix::cvt`, and the close-on-exec pipe the forked child
//! uses to report a failed `chdir`/`execve` back to the parent.

use std::{
    fs::File,
    io::{Error, ErrorKind, Read, Result},
    os::fd::{AsRawFd, FromRawFd, OwnedFd},
};

use nix::{errno::Errno, fcntl::OFlag, unistd::pipe2};

/// Footer written after the errno so a short or garbled report is detectable.
const CLOEXEC_MSG_FOOTER: [u8; 4] = *b"NOEX";

/// Turn a raw syscall return into a `Result`, reading `errno` on the `-1` sentinel.
pub fn cvt(ret: i32) -> Result<i32> {
    Errno::result(ret).map_err(Error::from)
}

/// Like [`cvt`], retrying while the call is interrupted by a signal.
pub fn cvt_r<F: FnMut() -> i32>(mut syscall: F) -> Result<i32> {
    loop {
        match Errno::result(syscall()) {
            Err(Errno::EINTR) => continue,
            other => return other.map_err(Error::from),
        }
    }
}

/// Read half of the exec status pipe, kept by the parent.
pub struct StatusReader(File);

/// Write half of the exec status pipe, kept by the child until `execve` closes it.
pub struct StatusWriter(OwnedFd);

/// What the parent learned from the status pipe.
pub enum ExecReport {
    /// The pipe closed without data: `execve` succeeded.
    Exec,
    /// The child failed before or during `execve` with this error.
    Failed(Error),
}

pub fn status_pipe() -> Result<(StatusReader, StatusWriter)> {
    let (read, write) = pipe2(OFlag::O_CLOEXEC).map_err(Error::from)?;
    // Safety: `pipe2` just handed us both descriptors and nothing else owns them.
    unsafe {
        Ok((
            StatusReader(File::from_raw_fd(read)),
            StatusWriter(OwnedFd::from_raw_fd(write)),
        ))
    }
}

impl StatusReader {
    /// Block until the child either execs (the write end is closed on exec) or reports
    /// an errno.
    pub fn wait_for_exec(mut self) -> Result<ExecReport> {
        let mut bytes = [0; 8];
        loop {
            match self.0.read(&mut bytes) {
                Ok(0) => return Ok(ExecReport::Exec),
                Ok(8) => {
                    let (errno, footer) = bytes.split_at(4);
                    if footer != CLOEXEC_MSG_FOOTER {
                        return Err(Error::new(
                            ErrorKind::InvalidData,
                            format!("validation on the CLOEXEC pipe failed: {:?}", bytes),
                        ));
                    }
                    let mut raw = [0; 4];
                    raw.copy_from_slice(errno);
                    let errno = i32::from_be_bytes(raw);
                    return Ok(ExecReport::Failed(Error::from_raw_os_error(errno)));
                }
                Ok(..) => {
                    // pipe I/O up to PIPE_BUF bytes should be atomic
                    return Err(Error::new(
                        ErrorKind::UnexpectedEof,
                        "short read on the CLOEXEC pipe",
                    ));
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

impl StatusWriter {
    /// Report `err` to the parent. Only called in the forked child, so it does not
    /// allocate and ignores its own failure: there is nobody left to tell.
    pub fn report(&self, err: &Error) {
        let errno = err.raw_os_error().unwrap_or(libc::EINVAL);
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&errno.to_be_bytes());
        bytes[4..].copy_from_slice(&CLOEXEC_MSG_FOOTER);
        let _ = nix::unistd::write(self.0.as_raw_fd(), &bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_pipe_means_exec() {
        let (reader, writer) = status_pipe().unwrap();
        drop(writer);
        assert!(matches!(reader.wait_for_exec().unwrap(), ExecReport::Exec));
    }

    #[test]
    fn test_reported_errno_round_trips() {
        let (reader, writer) = status_pipe().unwrap();
        writer.report(&Error::from_raw_os_error(libc::ENOENT));
        drop(writer);
        match reader.wait_for_exec().unwrap() {
            ExecReport::Failed(e) => assert_eq!(e.raw_os_error(), Some(libc::ENOENT)),
            ExecReport::Exec => panic!("expected a failure report"),
        }
    }

    #[test]
    fn test_cvt_maps_minus_one() {
        assert_eq!(cvt(3).unwrap(), 3);
        // fcntl on a descriptor that can't be open
        let err = cvt(unsafe { libc::fcntl(-1, libc::F_GETFD) }).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }
}
