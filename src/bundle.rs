use std::{
    borrow::Cow,
    ffi::{OsStr, OsString},
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use tracing::warn;

use crate::command_env::CommandEnv;

/// What a registered file is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Written to disk for the executable to find at runtime, never run
    Dependency,
    /// The program that [`Bundle::run`] starts
    Executable,
}

/// One file the bundle writes under its unpack root.
#[derive(Clone)]
pub struct ManagedFile<'a> {
    path: PathBuf,
    payload: Cow<'a, [u8]>,
    kind: FileKind,
}

impl<'a> ManagedFile<'a> {
    /// Output path, relative to the unpack root
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }
}

impl Debug for ManagedFile<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ManagedFile")
            .field("path", &self.path)
            .field("payload_len", &self.payload.len())
            .field("kind", &self.kind)
            .finish()
    }
}

/// A set of files to unpack plus the configuration for running the one executable among
/// them. Build it up with the registration methods, then call [`Bundle::unpack`] followed
/// by [`Bundle::run`].
///
/// # Examples
///
/// ```no_run
/// use std::fs::read;
///
/// use unpack_exec::Bundle;
///
/// // Usually these come from `include_bytes!()`
/// let lib = read("libvalue.so").unwrap();
/// let run = read("main.run").unwrap();
///
/// let code = Bundle::new()
///     .unpack_root("unpacked")
///     .add_dependency("lib/libvalue.so", lib)
///     .add_executable("bin/main.run", run)
///     .work_dir("unpacked/bin")
///     .env("LD_LIBRARY_PATH=../lib")
///     .unpack_and_run()
///     .expect("failed to run bundled program");
///
/// println!("program exit code: {}", code);
/// ```
#[derive(Clone, Default)]
pub struct Bundle<'a> {
    /// Registered files, in registration order
    files: Vec<ManagedFile<'a>>,
    /// Directory every output path is resolved against. Empty means the current directory
    unpack_root: PathBuf,
    /// Working directory for the child. `None` means the executable's own directory
    work_dir: Option<PathBuf>,
    /// Environment for the child
    env: CommandEnv,
    /// Arguments to the child, excluding the program name
    args: Vec<OsString>,
}

impl<'a> Bundle<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file the executable needs at runtime, such as a shared library.
    ///
    /// Paths are not checked for collisions: when two entries share a path, the one
    /// registered last is what ends up on disk.
    pub fn add_dependency<P, D>(&mut self, path: P, payload: D) -> &mut Self
    where
        P: AsRef<Path>,
        D: Into<Cow<'a, [u8]>>,
    {
        self.push(path.as_ref(), payload.into(), FileKind::Dependency)
    }

    /// Register the executable to run.
    ///
    /// Only the first executable registered is ever started. Later ones are still written
    /// to disk by [`Bundle::unpack`].
    pub fn add_executable<P, D>(&mut self, path: P, payload: D) -> &mut Self
    where
        P: AsRef<Path>,
        D: Into<Cow<'a, [u8]>>,
    {
        if let Some(first) = self.executable() {
            warn!(
                first = %first.path().display(),
                ignored = %path.as_ref().display(),
                "an executable is already registered; the new one will be unpacked but not run"
            );
        }
        self.push(path.as_ref(), payload.into(), FileKind::Executable)
    }

    /// Set the directory files are unpacked under. Defaults to the current directory.
    pub fn unpack_root<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        self.unpack_root = path.as_ref().to_path_buf();
        self
    }

    /// Set the working directory of the executable. This path is used exactly as given;
    /// a relative path is relative to the current directory of the caller, not to the
    /// unpack root. Defaults to the directory the executable is unpacked into.
    pub fn work_dir<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        self.work_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Add a raw `KEY=VALUE` environment entry. Once any entry is added, the executable
    /// sees only the added entries instead of inheriting this process's environment.
    pub fn env<S: AsRef<OsStr>>(&mut self, entry: S) -> &mut Self {
        self.env.push(entry.as_ref());
        self
    }

    /// Add an environment entry from a key and a value. Same semantics as [`Bundle::env`].
    pub fn env_pair<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env.push_pair(key.as_ref(), val.as_ref());
        self
    }

    /// Add an argument to the executable. The program name is not part of the list.
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Add multiple arguments to the executable.
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// All registered files in registration order.
    pub fn files(&self) -> &[ManagedFile<'a>] {
        &self.files
    }

    /// The executable that [`Bundle::run`] starts: the first one registered.
    pub fn executable(&self) -> Option<&ManagedFile<'a>> {
        self.files.iter().find(|f| f.kind == FileKind::Executable)
    }

    pub fn get_unpack_root(&self) -> &Path {
        &self.unpack_root
    }

    pub fn get_work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    /// The configured environment entries. Empty means the parent's is inherited.
    pub fn get_env(&self) -> &[OsString] {
        self.env.entries()
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Where `file` lands on disk: its output path joined onto the unpack root.
    pub fn resolve_path(&self, file: &ManagedFile<'_>) -> PathBuf {
        self.unpack_root.join(&file.path)
    }

    pub(crate) fn command_env(&self) -> &CommandEnv {
        &self.env
    }

    fn push(&mut self, path: &Path, payload: Cow<'a, [u8]>, kind: FileKind) -> &mut Self {
        self.files.push(ManagedFile {
            path: path.to_path_buf(),
            payload,
            kind,
        });
        self
    }
}

impl Debug for Bundle<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Bundle")
            .field("files", &self.files)
            .field("unpack_root", &self.unpack_root)
            .field("work_dir", &self.work_dir)
            .field("env", &self.env.entries())
            .field("args", &self.args)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order_is_kept() {
        let mut bundle = Bundle::new();
        bundle
            .add_dependency("lib/a.so", &b"a"[..])
            .add_executable("bin/b", vec![b'b'])
            .add_dependency("lib/c.so", &b"c"[..]);

        let paths: Vec<_> = bundle.files().iter().map(|f| f.path()).collect();
        assert_eq!(
            paths,
            vec![Path::new("lib/a.so"), Path::new("bin/b"), Path::new("lib/c.so")]
        );
        assert_eq!(bundle.files()[1].kind(), FileKind::Executable);
        assert_eq!(bundle.files()[1].payload(), b"b");
    }

    #[test]
    fn test_extra_executable_is_still_registered() {
        let mut bundle = Bundle::new();
        bundle
            .add_dependency("a", &b""[..])
            .add_executable("b", &b""[..])
            .add_executable("c", &b""[..]);
        assert_eq!(bundle.executable().unwrap().path(), Path::new("b"));

        // the extra executable is kept for unpacking, still tagged as an executable
        let extra = &bundle.files()[2];
        assert_eq!(extra.path(), Path::new("c"));
        assert_eq!(extra.kind(), FileKind::Executable);
    }

    #[test]
    fn test_defaults() {
        let bundle = Bundle::new();
        assert!(bundle.executable().is_none());
        assert_eq!(bundle.get_unpack_root(), Path::new(""));
        assert!(bundle.get_work_dir().is_none());
        assert!(bundle.get_env().is_empty());
        assert!(bundle.get_args().is_empty());
    }

    #[test]
    fn test_resolve_path_joins_root() {
        let mut bundle = Bundle::new();
        bundle
            .unpack_root("unpacked")
            .add_executable("bin/main.run", &b""[..]);
        let exe = bundle.executable().unwrap();
        assert_eq!(
            bundle.resolve_path(exe),
            PathBuf::from("unpacked/bin/main.run")
        );
    }

    #[test]
    fn test_env_pair_formats_entry() {
        let mut bundle = Bundle::new();
        bundle.env_pair("FOO", "bar").env("BAZ=qux");
        assert_eq!(
            bundle.get_env(),
            &[OsString::from("FOO=bar"), OsString::from("BAZ=qux")]
        );
    }
}
