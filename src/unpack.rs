//! Writing registered files to disk.

use std::{
    fs::{DirBuilder, OpenOptions},
    io::Write,
    os::unix::fs::{DirBuilderExt, OpenOptionsExt},
    path::Path,
};

use tracing::debug;

use crate::{
    bundle::Bundle,
    error::{Error, Result},
};

/// Permission bits for created directories and files, before the umask
const MODE: u32 = 0o777;

fn create_dir_all(path: &Path) -> Result<()> {
    DirBuilder::new()
        .recursive(true)
        .mode(MODE)
        .create(path)
        .map_err(|source| Error::DirectoryCreate {
            path: path.to_path_buf(),
            source,
        })
}

fn write_file(path: &Path, payload: &[u8]) -> Result<()> {
    let to_err = |source| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(MODE)
        .open(path)
        .map_err(to_err)?;
    file.write_all(payload).map_err(to_err)
}

impl<'a> Bundle<'a> {
    /// Write every registered file under the unpack root, in registration order, creating
    /// missing directories on the way.
    ///
    /// Existing files are overwritten, so unpacking twice leaves the same contents on disk.
    /// The first failure is returned as is; files written before it stay in place.
    pub fn unpack(&self) -> Result<()> {
        let root = self.get_unpack_root();
        if !root.as_os_str().is_empty() {
            debug!(root = %root.display(), "creating unpack root");
            create_dir_all(root)?;
        }

        for file in self.files() {
            let path = self.resolve_path(file);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                create_dir_all(parent)?;
            }
            debug!(
                path = %path.display(),
                kind = ?file.kind(),
                len = file.payload().len(),
                "writing file"
            );
            write_file(&path, file.payload())?;
        }

        Ok(())
    }
}
