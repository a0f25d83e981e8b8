//! Starting the unpacked executable. This follows the shape of std's unix `Command`
//! implementation:
//! <https://github.com/rust-lang/rust/blob/master/library/std/src/sys/unix/process/process_unix.rs>
//! <https://github.com/rust-lang/rust/blob/master/library/std/src/sys/unix/process/process_common.rs>
//! Everything the child needs is converted to C strings before `fork`, so the child only
//! makes raw syscalls between `fork` and `execve`.

use std::{
    ffi::{CString, OsStr},
    io::{Error as IoError, ErrorKind},
    os::unix::prelude::OsStrExt,
    path::{self, Path, PathBuf},
    ptr::null,
};

use libc::{c_char, pid_t};
use nix::sys::signal::{signal, SigHandler, SigSet, Signal};
use tracing::{debug, info};

use crate::{
    bundle::Bundle,
    child::Child,
    error::{Error, Result},
    process::Process,
    sys::{cvt, status_pipe, ExecReport},
};

/// Exit code of a forked child whose `execve` failed. The parent never reports it: the
/// real errno travels over the status pipe.
const EXEC_FAILED: libc::c_int = 127;

/// A NUL-terminated array of C string pointers, as `execve` wants for argv and envp.
/// The pointers borrow from `strings`, which is never modified after construction.
struct CStringArray {
    strings: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl CStringArray {
    fn new(strings: Vec<CString>) -> Self {
        let mut ptrs: Vec<*const c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(null());
        Self { strings, ptrs }
    }

    fn as_ptr(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }

    fn len(&self) -> usize {
        self.strings.len()
    }
}

fn nul_error(what: &str) -> IoError {
    IoError::new(
        ErrorKind::InvalidInput,
        format!("nul byte found in provided {}", what),
    )
}

fn os2c(s: &OsStr, what: &str) -> std::io::Result<CString> {
    CString::new(s.as_bytes()).map_err(|_| nul_error(what))
}

/// A fully prepared `execve` call.
struct Launch {
    program: CString,
    argv: CStringArray,
    envp: CStringArray,
    cwd: CString,
}

impl Launch {
    fn prepare(bundle: &Bundle<'_>, program: &Path, cwd: &Path) -> std::io::Result<Self> {
        let program_c = os2c(program.as_os_str(), "program path")?;

        // argv[0] is the program itself, followed by the configured arguments verbatim
        let mut argv = Vec::with_capacity(bundle.get_args().len() + 1);
        argv.push(program_c.clone());
        for arg in bundle.get_args() {
            argv.push(os2c(arg, "argument")?);
        }

        let envp = bundle
            .command_env()
            .capture()
            .into_iter()
            .map(|entry| CString::new(entry).map_err(|_| nul_error("environment")))
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(Self {
            program: program_c,
            argv: CStringArray::new(argv),
            envp: CStringArray::new(envp),
            cwd: os2c(cwd.as_os_str(), "working directory")?,
        })
    }

    fn spawn(&self) -> std::io::Result<Process> {
        let (reader, writer) = status_pipe()?;

        let pid = unsafe { self.do_fork()? };

        if pid == 0 {
            drop(reader);
            // Safety: we are the freshly forked child and only make raw syscalls from here.
            unsafe {
                let err = self.do_exec();
                writer.report(&err);
                libc::_exit(EXEC_FAILED)
            }
        }

        drop(writer);

        // Safety: `pid` is our own freshly forked child.
        let mut p = unsafe { Process::new(pid) };
        match reader.wait_for_exec() {
            Ok(ExecReport::Exec) => Ok(p),
            Ok(ExecReport::Failed(err)) => {
                // reap the child that never became the executable
                let _ = p.wait();
                Err(err)
            }
            Err(err) => {
                let _ = p.wait();
                Err(err)
            }
        }
    }

    unsafe fn do_fork(&self) -> std::io::Result<pid_t> {
        cvt(libc::fork())
    }

    /// Runs in the child. Only returns if something failed.
    unsafe fn do_exec(&self) -> IoError {
        if let Err(e) = cvt(libc::chdir(self.cwd.as_ptr())) {
            return e;
        }

        // Reset signal handling so the executable starts in a standardized state. libstd
        // ignores SIGPIPE, and a signal mask set by the host would otherwise be inherited.
        if let Err(e) = SigSet::empty().thread_set_mask() {
            return e.into();
        }
        if let Err(e) = signal(Signal::SIGPIPE, SigHandler::SigDfl) {
            return e.into();
        }

        libc::execve(self.program.as_ptr(), self.argv.as_ptr(), self.envp.as_ptr());
        IoError::last_os_error()
    }
}

/// Start `bundle`'s executable from wherever [`Bundle::unpack`] put it.
fn spawn_bundle(bundle: &Bundle<'_>) -> Result<Child> {
    let exe = bundle.executable().ok_or(Error::NoExecutable)?;

    let joined = bundle.resolve_path(exe);
    let program = path::absolute(&joined).map_err(|source| Error::PathResolution {
        path: joined.clone(),
        source,
    })?;

    let cwd: PathBuf = match bundle.get_work_dir() {
        Some(dir) => dir.to_path_buf(),
        None => program
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/")),
    };

    let start_err = |source| Error::Start {
        path: program.clone(),
        source,
    };

    let launch = Launch::prepare(bundle, &program, &cwd).map_err(start_err)?;
    debug!(
        program = %program.display(),
        cwd = %cwd.display(),
        args = launch.argv.len() - 1,
        inherit_env = bundle.command_env().is_inherited(),
        env = launch.envp.len(),
        "launching executable"
    );

    let process = launch.spawn().map_err(start_err)?;
    info!(pid = process.id(), program = %program.display(), "executable started");
    Ok(Child::new(process, program))
}

impl<'a> Bundle<'a> {
    /// Start the executable as a child process without waiting for it.
    ///
    /// The program is the absolute path of the first registered executable under the
    /// unpack root. The child runs in the configured working directory (or the
    /// executable's own directory), receives the configured arguments, and either the
    /// configured environment or, if none was set, this process's environment. Its
    /// standard streams are inherited.
    ///
    /// [`Bundle::unpack`] must have run first; otherwise this fails with
    /// [`Error::Start`] because the program does not exist.
    pub fn spawn(&self) -> Result<Child> {
        spawn_bundle(self)
    }

    /// Start the executable and block until it exits, returning its exit code.
    ///
    /// A child killed by a signal reports `128 + signal`. On error, no child exit code
    /// exists; [`Error::exit_code`] gives the `-1` sentinel for callers that need one.
    pub fn run(&self) -> Result<i32> {
        let status = self.spawn()?.wait()?;
        Ok(status.exit_code())
    }

    /// [`Bundle::unpack`] followed by [`Bundle::run`].
    pub fn unpack_and_run(&self) -> Result<i32> {
        self.unpack()?;
        self.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argv_starts_with_program() {
        let mut bundle = Bundle::new();
        bundle.arg("-v").arg("x y");
        let launch =
            Launch::prepare(&bundle, Path::new("/tmp/bin/main.run"), Path::new("/tmp")).unwrap();
        let argv: Vec<_> = launch
            .argv
            .strings
            .iter()
            .map(|s| s.to_str().unwrap())
            .collect();
        assert_eq!(argv, vec!["/tmp/bin/main.run", "-v", "x y"]);
        assert!(launch.argv.ptrs.last().unwrap().is_null());
        assert_eq!(launch.cwd.to_str().unwrap(), "/tmp");
    }

    #[test]
    fn test_configured_env_is_exact() {
        let mut bundle = Bundle::new();
        bundle.env("FOO=bar");
        let launch = Launch::prepare(&bundle, Path::new("/bin/true"), Path::new("/")).unwrap();
        assert_eq!(launch.envp.len(), 1);
        assert_eq!(launch.envp.strings[0].to_str().unwrap(), "FOO=bar");
    }

    #[test]
    fn test_nul_in_argument_is_rejected() {
        let mut bundle = Bundle::new();
        bundle.arg("a\0b");
        let err = Launch::prepare(&bundle, Path::new("/bin/true"), Path::new("/"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_no_executable() {
        let mut bundle = Bundle::new();
        bundle.add_dependency("lib/libvalue.so", &b"P1"[..]);
        let err = bundle.run().unwrap_err();
        assert!(matches!(err, Error::NoExecutable));
        assert_eq!(err.exit_code(), -1);
    }
}
