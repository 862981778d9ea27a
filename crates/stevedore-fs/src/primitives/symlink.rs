use crate::error::write_err;
use crate::{Error, Result};
use std::path::Path;

/// Point `link` at `target`, replacing any link already at `link`.
///
/// The new link is created under a temporary name and renamed into place.
pub fn atomic_symlink(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    let target = target.as_ref();
    let link = link.as_ref();

    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent).map_err(write_err(parent))?;
    }

    let name = link
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = link.with_file_name(format!(".{name}.link.{}", uuid::Uuid::new_v4()));

    create_link(target, &tmp).map_err(write_err(&tmp))?;

    if let Ok(existing) = std::fs::symlink_metadata(link)
        && existing.is_dir()
        && !existing.file_type().is_symlink()
    {
        // A real directory cannot be renamed over; clear it first.
        std::fs::remove_dir_all(link).map_err(write_err(link))?;
    }

    std::fs::rename(&tmp, link).map_err(|source| {
        let _ = std::fs::remove_file(&tmp);
        Error::Write {
            path: link.to_path_buf(),
            source,
        }
    })
}

#[cfg(unix)]
fn create_link(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_link(target: &Path, link: &Path) -> std::io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}
