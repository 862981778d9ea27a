//! Failure classification, kept apart from the state machine so each rule
//! can be exercised on its own.

use stevedore_fetch::{FailureClass, FetchError};
use stevedore_state::OperationStatus;

use crate::config::DeploymentConfig;
use crate::effects::QueryError;
use crate::kind::ArtifactKind;

/// Next move after a failed fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Contention; retry without spending the failure budget.
    InternalRetry,
    /// The artifact kind never retries this error.
    NonRetryable,
    /// Content is missing; ask whether the owner still exists.
    QueryDeletion,
    /// Spend one unit of the failure budget.
    CountFailure,
}

pub fn classify_failure(
    status: &OperationStatus,
    config: &DeploymentConfig,
    kind: ArtifactKind,
    error: &FetchError,
) -> Classification {
    if kind.is_terminal_error(error) {
        return Classification::NonRetryable;
    }

    match error.class() {
        FailureClass::Internal
            if config.retry_on_internal_error && status.internal_failure_count < config.internal_retry_limit =>
        {
            Classification::InternalRetry
        },
        FailureClass::NotFound if kind.capabilities().checks_deletion => Classification::QueryDeletion,
        _ => Classification::CountFailure,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionVerdict {
    Deleted,
    /// Not deleted, or the query could not tell. Either way the
    /// not-found error goes through the ordinary failure path.
    NotDeleted,
}

pub fn after_deletion_query(result: &Result<bool, QueryError>) -> DeletionVerdict {
    match result {
        Ok(true) => DeletionVerdict::Deleted,
        Ok(false) | Err(_) => DeletionVerdict::NotDeleted,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureVerdict {
    Retry,
    Exhausted,
}

/// Record one budget-consuming failure on `status`.
pub fn count_failure(status: &mut OperationStatus, max_failure_count: u32, error: &FetchError) -> FailureVerdict {
    status.failure_count = status.failure_count.saturating_add(1);
    status.last_error = Some(error.to_string());
    if status.failure_count >= max_failure_count {
        FailureVerdict::Exhausted
    } else {
        FailureVerdict::Retry
    }
}
