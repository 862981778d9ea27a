//! Outcomes surfaced to download callers.

use stevedore_fetch::FetchError;

use crate::effects::ProvisionError;

/// Terminal outcome of a download that did not succeed.
///
/// Contention and ordinary transient failures never appear here; the
/// coordinator absorbs them into retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownloadError {
    /// Another download owns the key. Not a failure of the content.
    #[error("a download for this key is already in progress")]
    DeploymentInProgress,

    #[error("download previously failed permanently: {cause}")]
    StickyTerminal { cause: FetchError },

    #[error("the owning application has been deleted")]
    EntityDeleted,

    #[error("download failed {failures} times, last error: {last}")]
    RetryBudgetExhausted { failures: u32, last: FetchError },

    #[error("download canceled")]
    Canceled,

    #[error("download failed permanently: {cause}")]
    NonRetryable { cause: FetchError },

    #[error("download succeeded but provisioning failed: {cause}")]
    Provisioning { cause: ProvisionError },
}

impl DownloadError {
    /// Duplicate suppression is not a failure of the requested content.
    pub fn is_benign(&self) -> bool { matches!(self, DownloadError::DeploymentInProgress) }
}

/// What the sticky failure cache remembers about a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StickyFailure {
    EntityDeleted,
    Terminal(FetchError),
}

impl From<StickyFailure> for DownloadError {
    fn from(failure: StickyFailure) -> Self {
        match failure {
            StickyFailure::EntityDeleted => DownloadError::EntityDeleted,
            StickyFailure::Terminal(cause) => DownloadError::StickyTerminal { cause },
        }
    }
}
