//! Error types for stevedore-fetch.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// How a caller should react to a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Contention with another writer. Retried without spending the budget.
    Internal,
    /// The content is missing from the store; the owning entity may be gone.
    NotFound,
    /// Anything else. Spends the retry budget.
    Transient,
}

/// A fetch failure.
///
/// Cloneable so it can be kept as the last error of an operation and cached
/// as a sticky failure; I/O causes are carried as rendered messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    #[error("'{path}' is being written by another operation")]
    SharingViolation { path: PathBuf },

    #[error("checksum mismatch for '{path}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        path:     PathBuf,
        expected: String,
        actual:   String,
    },

    #[error("I/O error on '{path}': {message}")]
    Io { path: PathBuf, message: String },

    #[error("attempt timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("invalid archive '{path}': {message}")]
    InvalidArchive { path: PathBuf, message: String },

    #[error("service manifest '{name}' not found")]
    ManifestNotFound { name: String },

    #[error("pre-deployment is not allowed on this node")]
    PreDeploymentNotAllowed,

    #[error("invalid package sharing policy for '{name}'")]
    InvalidSharingPolicy { name: String },

    #[error("failed to pull container image '{image}': {message}")]
    ContainerImage { image: String, message: String },

    #[error("operation canceled")]
    Canceled,

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn class(&self) -> FailureClass {
        match self {
            FetchError::SharingViolation { .. } => FailureClass::Internal,
            FetchError::NotFound { .. } => FailureClass::NotFound,
            _ => FailureClass::Transient,
        }
    }
}

impl From<stevedore_fs::Error> for FetchError {
    fn from(e: stevedore_fs::Error) -> Self {
        match e {
            stevedore_fs::Error::NotFound { path } => FetchError::NotFound { path },
            stevedore_fs::Error::Locked { path } => FetchError::SharingViolation { path },
            stevedore_fs::Error::Archive { path, source } => FetchError::InvalidArchive {
                path,
                message: source.to_string(),
            },
            other if other.is_not_found() => FetchError::NotFound {
                path: other.path().to_path_buf(),
            },
            stevedore_fs::Error::Read { path, source }
            | stevedore_fs::Error::Write { path, source }
            | stevedore_fs::Error::ReplaceDir { path, source } => FetchError::Io {
                path,
                message: source.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class() {
        assert_eq!(
            FetchError::SharingViolation { path: "a".into() }.class(),
            FailureClass::Internal
        );
        assert_eq!(FetchError::NotFound { path: "a".into() }.class(), FailureClass::NotFound);
        assert_eq!(FetchError::Other("boom".into()).class(), FailureClass::Transient);
        assert_eq!(
            FetchError::Timeout {
                after: Duration::from_secs(1)
            }
            .class(),
            FailureClass::Transient
        );
    }

    #[test]
    fn test_from_fs_error() {
        let locked = stevedore_fs::Error::Locked { path: "pkg".into() };
        assert_eq!(FetchError::from(locked), FetchError::SharingViolation { path: "pkg".into() });

        let missing = stevedore_fs::Error::Read {
            path:   "pkg".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(FetchError::from(missing), FetchError::NotFound { path: "pkg".into() });
    }
}
