use crate::error::write_err;
use crate::Result;
use std::path::{Path, PathBuf};

/// A private staging area that is either committed over its destination or
/// removed on drop.
///
/// The staging directory is created next to the destination so the final
/// rename never crosses a filesystem boundary.
pub struct Workspace {
    staging_path:     PathBuf,
    destination_path: PathBuf,
    committed:        bool,
}

impl Workspace {
    pub fn new(destination: impl AsRef<Path>) -> Result<Self> {
        let destination_path = destination.as_ref().to_path_buf();
        let parent = destination_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = destination_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "staged".to_string());

        let staging_path = parent.join(format!(".{name}.staging.{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&staging_path).map_err(write_err(&staging_path))?;

        Ok(Self {
            staging_path,
            destination_path,
            committed: false,
        })
    }

    pub fn path(&self) -> &Path { &self.staging_path }

    pub fn destination(&self) -> &Path { &self.destination_path }

    /// Path inside the staging area that will become the destination itself.
    pub fn payload_path(&self) -> PathBuf { self.staging_path.join("payload") }

    /// Move the staged payload over the destination.
    pub fn commit(mut self) -> Result<()> {
        crate::primitives::replace_path(self.payload_path(), &self.destination_path)?;
        self.committed = true;
        let _ = std::fs::remove_dir_all(&self.staging_path);
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_dir_all(&self.staging_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_workspace_commit() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("dest");
        let workspace = Workspace::new(&dest).unwrap();
        std::fs::create_dir_all(workspace.payload_path()).unwrap();
        std::fs::write(workspace.payload_path().join("file.txt"), "data").unwrap();
        let staging = workspace.path().to_path_buf();

        workspace.commit().unwrap();
        assert!(dest.join("file.txt").exists());
        assert!(!staging.exists());
    }

    #[test]
    fn test_workspace_cleanup_on_drop() {
        let dir = tempdir().unwrap();
        let staging;
        {
            let workspace = Workspace::new(dir.path().join("dest")).unwrap();
            std::fs::write(workspace.path().join("file.txt"), "data").unwrap();
            staging = workspace.path().to_path_buf();
            assert!(staging.exists());
        }
        assert!(!staging.exists());
        assert!(!dir.path().join("dest").exists());
    }
}
