use crate::error::{read_err, write_err};
use crate::{Error, Result};
use std::fs;
use std::path::Path;

pub fn copy_dir_all(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if !dest.exists() {
        fs::create_dir_all(dest).map_err(write_err(dest))?;
    }

    for entry in fs::read_dir(src).map_err(read_err(src))? {
        let entry = entry.map_err(read_err(src))?;
        let file_type = entry.file_type().map_err(read_err(entry.path()))?;

        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir_all(&src_path, &dest_path)?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(&src_path).map_err(read_err(&src_path))?;
            crate::primitives::symlink::atomic_symlink(target, &dest_path)?;
        } else {
            fs::copy(&src_path, &dest_path).map_err(write_err(&dest_path))?;
        }
    }
    Ok(())
}

/// Copy a file or a directory tree to `dest`, creating parents as needed.
pub fn copy_all(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    let metadata = fs::metadata(src).map_err(read_err(src))?;
    if metadata.is_dir() {
        return copy_dir_all(src, dest);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(write_err(parent))?;
    }
    fs::copy(src, dest).map_err(|source| Error::Write {
        path: dest.to_path_buf(),
        source,
    })?;
    Ok(())
}
