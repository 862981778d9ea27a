use crate::OperationStatus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    /// Another operation owns the key. Carries that operation's status.
    #[error("operation already in progress ({0})")]
    AlreadyExists(OperationStatus),

    #[error("pending operation map is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StickyError {
    #[error("a sticky failure is already recorded for this key")]
    AlreadyExists,

    #[error("sticky failure cache is closed")]
    Closed,
}
