use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::identity::ApplicationId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("deleted-entity query timed out after {0:?}")]
    Timeout(Duration),

    #[error("deleted-entity query failed: {0}")]
    Failed(String),

    #[error("invalid query argument: {0}")]
    InvalidArgument(String),
}

/// Asks the cluster whether an application has been deleted.
#[async_trait]
pub trait DeletedEntityQuery: Send + Sync {
    async fn is_deleted(&self, application_id: &ApplicationId, timeout: Duration) -> Result<bool, QueryError>;
}

/// A fixed, locally maintained set of deleted applications.
#[derive(Debug, Default)]
pub struct StaticDeletedEntities {
    deleted: Mutex<HashSet<ApplicationId>>,
}

impl StaticDeletedEntities {
    pub fn new(deleted: impl IntoIterator<Item = ApplicationId>) -> Self {
        Self {
            deleted: Mutex::new(deleted.into_iter().collect()),
        }
    }

    pub fn mark_deleted(&self, application_id: ApplicationId) {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(application_id);
    }
}

#[async_trait]
impl DeletedEntityQuery for StaticDeletedEntities {
    async fn is_deleted(&self, application_id: &ApplicationId, _timeout: Duration) -> Result<bool, QueryError> {
        Ok(self
            .deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(application_id))
    }
}
