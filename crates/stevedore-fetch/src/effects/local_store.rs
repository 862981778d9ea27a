use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use stevedore_fs::{PathLock, Workspace};

use crate::effects::ContentFetcher;
use crate::{FetchError, FetchRequest};

/// A [`ContentFetcher`] over a package store reachable as a directory.
///
/// Content is copied store -> cache -> destination. Each hop goes through a
/// staging [`Workspace`] and an atomic replace, so readers of the cache or of
/// the run layout never see partial content. Writers of the same path are
/// serialized by a [`PathLock`]; losing that race is a
/// [`FetchError::SharingViolation`]. Stored checksums are read from
/// `checksum_source` inside the same fetch.
#[derive(Debug, Clone)]
pub struct LocalStoreFetcher {
    store_root: PathBuf,
    cache_root: PathBuf,
}

impl LocalStoreFetcher {
    pub fn new(store_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            store_root: store_root.into(),
            cache_root: cache_root.into(),
        }
    }

    pub fn store_root(&self) -> &Path { &self.store_root }

    pub fn cache_root(&self) -> &Path { &self.cache_root }

    /// Cache location of a store-relative path.
    pub fn cache_path(&self, source: &Path) -> PathBuf { self.cache_root.join(source) }

    fn fetch_blocking(&self, request: &FetchRequest) -> Result<(), FetchError> {
        let expected = match (&request.expected_checksum, &request.checksum_source) {
            (Some(checksum), _) => Some(normalize(checksum)),
            (None, Some(checksum_source)) => Some(self.read_checksum(checksum_source)?),
            (None, None) => None,
        };

        let cached = self.cache_path(&request.source);
        {
            let _cache_lock = PathLock::acquire(&cached)?;
            let fresh = request.refresh_cache || std::fs::symlink_metadata(&cached).is_err();
            if fresh {
                self.populate_cache(request, &cached)?;
            }

            if let Some(expected) = &expected
                && let Err(mismatch) = verify(&cached, expected, &request.source)
            {
                if fresh {
                    return Err(mismatch);
                }
                tracing::debug!(source = %request.source.display(), "cached content is stale, refreshing");
                self.populate_cache(request, &cached)?;
                verify(&cached, expected, &request.source)?;
            }
        }

        if request.cache_only {
            tracing::debug!(source = %request.source.display(), "cached");
            return Ok(());
        }

        let _dest_lock = PathLock::acquire(&request.destination)?;
        let workspace = Workspace::new(&request.destination)?;
        stevedore_fs::copy_all(&cached, workspace.payload_path())?;
        workspace.commit()?;

        tracing::debug!(
            source = %request.source.display(),
            destination = %request.destination.display(),
            "fetched"
        );
        Ok(())
    }

    fn populate_cache(&self, request: &FetchRequest, cached: &Path) -> Result<(), FetchError> {
        let source = self.store_root.join(&request.source);
        let workspace = Workspace::new(cached)?;

        if std::fs::symlink_metadata(&source).is_ok() {
            stevedore_fs::copy_all(&source, workspace.payload_path())?;
        } else {
            let archive = stevedore_fs::archive_sibling(&source);
            if !request.check_archive || !archive.is_file() {
                return Err(FetchError::NotFound { path: source });
            }
            tracing::debug!(archive = %archive.display(), "unpacking archived package");
            stevedore_fs::unpack_tar_gz(&archive, workspace.payload_path())?;
        }

        workspace.commit()?;
        Ok(())
    }

    fn read_checksum(&self, checksum_source: &Path) -> Result<String, FetchError> {
        let path = self.store_root.join(checksum_source);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(normalize(&contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchError::NotFound { path }),
            Err(e) => Err(FetchError::Io {
                path,
                message: e.to_string(),
            }),
        }
    }
}

fn normalize(checksum: &str) -> String { checksum.trim().to_ascii_lowercase() }

fn verify(path: &Path, expected: &str, source: &Path) -> Result<(), FetchError> {
    let actual = stevedore_fs::content_digest(path)?;
    if actual == expected {
        Ok(())
    } else {
        Err(FetchError::ChecksumMismatch {
            path: source.to_path_buf(),
            expected: expected.to_string(),
            actual,
        })
    }
}

async fn run_blocking<T, F>(timeout: Duration, work: F) -> Result<T, FetchError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, FetchError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(work)).await {
        Err(_) => Err(FetchError::Timeout { after: timeout }),
        Ok(Err(join)) => Err(FetchError::Other(format!("fetch task failed: {join}"))),
        Ok(Ok(result)) => result,
    }
}

#[async_trait]
impl ContentFetcher for LocalStoreFetcher {
    async fn fetch(&self, request: &FetchRequest, timeout: Duration) -> Result<(), FetchError> {
        let this = self.clone();
        let request = request.clone();
        run_blocking(timeout, move || this.fetch_blocking(&request)).await
    }
}
