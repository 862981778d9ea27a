use crate::error::write_err;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Move `src` over `dest`, replacing whatever `dest` currently holds.
///
/// An existing destination is first renamed aside so that a failed rename
/// can be rolled back; readers never observe a half-written destination.
pub fn replace_path(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(write_err(parent))?;
    }

    let displaced = if std::fs::symlink_metadata(dest).is_ok() {
        let aside = aside_path(dest);
        std::fs::rename(dest, &aside).map_err(|source| Error::ReplaceDir {
            path: dest.to_path_buf(),
            source,
        })?;
        Some(aside)
    } else {
        None
    };

    if let Err(source) = std::fs::rename(src, dest) {
        if let Some(aside) = &displaced {
            let _ = std::fs::rename(aside, dest);
        }
        return Err(Error::ReplaceDir {
            path: dest.to_path_buf(),
            source,
        });
    }

    if let Some(aside) = displaced {
        let _ = remove_any(&aside);
    }
    Ok(())
}

fn aside_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.old.{}", uuid::Uuid::new_v4()))
}

pub(crate) fn remove_any(path: &Path) -> std::io::Result<()> {
    let metadata = std::fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_replace_missing_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("file.txt"), "data").unwrap();

        replace_path(&src, &dest).unwrap();
        assert!(dest.join("file.txt").exists());
        assert!(!src.exists());
    }

    #[test]
    fn test_replace_non_empty_directory() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(src.join("new.txt"), "new").unwrap();
        std::fs::write(dest.join("old.txt"), "old").unwrap();

        replace_path(&src, &dest).unwrap();
        assert!(dest.join("new.txt").exists());
        assert!(!dest.join("old.txt").exists());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".old."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_replace_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("staged.xml");
        let dest = dir.path().join("run/Manifest.xml");
        std::fs::write(&src, "v2").unwrap();

        replace_path(&src, &dest).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "v2");
    }
}
