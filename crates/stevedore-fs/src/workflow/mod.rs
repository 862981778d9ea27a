mod lock;
mod workspace;

pub use lock::PathLock;
pub use workspace::Workspace;
