use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to replace '{path}': {source}")]
    ReplaceDir { path: PathBuf, source: io::Error },

    #[error("'{path}' is locked by another writer")]
    Locked { path: PathBuf },

    #[error("failed to unpack archive '{path}': {source}")]
    Archive { path: PathBuf, source: io::Error },
}

impl Error {
    /// Whether the error means the path simply does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Read { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            Error::NotFound { path }
            | Error::Read { path, .. }
            | Error::Write { path, .. }
            | Error::ReplaceDir { path, .. }
            | Error::Locked { path }
            | Error::Archive { path, .. } => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn read_err(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
    let path = path.into();
    move |source| {
        if source.kind() == io::ErrorKind::NotFound {
            Error::NotFound { path }
        } else {
            Error::Read { path, source }
        }
    }
}

pub(crate) fn write_err(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
    let path = path.into();
    move |source| Error::Write { path, source }
}
