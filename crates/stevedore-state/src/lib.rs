//! Shared bookkeeping for in-flight downloads.
//!
//! - [`PendingOperationMap`] admits at most one active operation per key and
//!   hands back every owning handle on close.
//! - [`StickyFailureCache`] remembers terminal failures until a later caller
//!   consumes them.
//!
//! Both are plain synchronous structures behind a `Mutex`; they never hold the
//! lock across an await point.

mod error;
mod pending;
mod status;
mod sticky;

pub use error::{StartError, StickyError};
pub use pending::PendingOperationMap;
pub use status::{OperationState, OperationStatus};
pub use sticky::StickyFailureCache;
