use crate::error::write_err;
use crate::{Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Advisory writer lock on a destination path.
///
/// Holds an exclusive OS lock on a `<path>.lock` sentinel; a second writer
/// gets [`Error::Locked`]. The kernel drops the lock when the holder exits,
/// so a sentinel left behind by a dead process never blocks a later writer.
/// The sentinel file itself is left in place.
#[derive(Debug)]
pub struct PathLock {
    file: File,
    sentinel: PathBuf,
}

impl PathLock {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let sentinel = sentinel_for(path);
        if let Some(parent) = sentinel.parent() {
            std::fs::create_dir_all(parent).map_err(write_err(parent))?;
        }

        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&sentinel)
            .map_err(write_err(&sentinel))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file, sentinel }),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(Error::Locked {
                path: path.to_path_buf(),
            }),
            Err(source) => Err(Error::Write {
                path: sentinel,
                source,
            }),
        }
    }

    pub fn sentinel(&self) -> &Path { &self.sentinel }
}

impl Drop for PathLock {
    fn drop(&mut self) { let _ = self.file.unlock(); }
}

fn sentinel_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}
