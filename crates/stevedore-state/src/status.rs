use std::fmt;

/// Lifecycle of a pending operation. Ordered; it only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum OperationState {
    #[default]
    Unassigned,
    InProgress,
    Completed,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationState::Unassigned => write!(f, "Unassigned"),
            OperationState::InProgress => write!(f, "InProgress"),
            OperationState::Completed => write!(f, "Completed"),
        }
    }
}

/// Progress record of one download key.
///
/// `failure_count` counts failures that consume the retry budget;
/// `internal_failure_count` counts contention failures that do not.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationStatus {
    pub state:                  OperationState,
    pub failure_count:          u32,
    pub internal_failure_count: u32,
    pub last_error:             Option<String>,
}

impl OperationStatus {
    pub fn in_progress() -> Self {
        Self {
            state: OperationState::InProgress,
            ..Self::default()
        }
    }

    pub fn is_completed(&self) -> bool { self.state == OperationState::Completed }

    /// Move to `next` if it is not behind the current state.
    ///
    /// Returns `false` and leaves the state untouched for a backward move.
    pub fn advance(&mut self, next: OperationState) -> bool {
        if next < self.state {
            return false;
        }
        self.state = next;
        true
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failures={} internal={}",
            self.state, self.failure_count, self.internal_failure_count
        )?;
        if let Some(error) = &self.last_error {
            write!(f, " last_error={error}")?;
        }
        Ok(())
    }
}
