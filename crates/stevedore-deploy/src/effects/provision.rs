use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::plan::ProvisionRequest;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    #[error("failed to create folder '{path}': {message}")]
    Folder { path: PathBuf, message: String },

    #[error("failed to link '{link}' to '{target}': {message}")]
    Link {
        link:    PathBuf,
        target:  PathBuf,
        message: String,
    },

    #[error("provisioning timed out after {0:?}")]
    Timeout(Duration),

    #[error("provisioning task failed: {0}")]
    Task(String),
}

/// Sets up folders and links once a download has succeeded. Must be idempotent.
#[async_trait]
pub trait ResourceProvisioner: Send + Sync {
    async fn provision(&self, request: &ProvisionRequest, timeout: Duration) -> Result<(), ProvisionError>;
}

/// Creates folders and replaces links on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProvisioner;

impl FsProvisioner {
    fn provision_blocking(request: &ProvisionRequest) -> Result<(), ProvisionError> {
        for folder in &request.folders {
            stevedore_fs::ensure_dir(folder).map_err(|e| ProvisionError::Folder {
                path:    folder.clone(),
                message: e.to_string(),
            })?;
        }

        for link in &request.links {
            let result = stevedore_fs::ensure_dir(&link.target)
                .and_then(|()| stevedore_fs::atomic_symlink(&link.target, &link.link));
            result.map_err(|e| ProvisionError::Link {
                link:    link.link.clone(),
                target:  link.target.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceProvisioner for FsProvisioner {
    async fn provision(&self, request: &ProvisionRequest, timeout: Duration) -> Result<(), ProvisionError> {
        let request = request.clone();
        let work = tokio::task::spawn_blocking(move || Self::provision_blocking(&request));
        match tokio::time::timeout(timeout, work).await {
            Err(_) => Err(ProvisionError::Timeout(timeout)),
            Ok(Err(join)) => Err(ProvisionError::Task(join.to_string())),
            Ok(Ok(result)) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let dir = tempdir().unwrap();
        let request = ProvisionRequest::default()
            .folder(dir.path().join("app/work"))
            .link(dir.path().join("app/log"), dir.path().join("logs/node1/app"));

        let timeout = Duration::from_secs(10);
        FsProvisioner.provision(&request, timeout).await.unwrap();
        FsProvisioner.provision(&request, timeout).await.unwrap();

        assert!(dir.path().join("app/work").is_dir());
        std::fs::write(dir.path().join("app/log/trace.txt"), "x").unwrap();
        assert!(dir.path().join("logs/node1/app/trace.txt").exists());
    }
}
