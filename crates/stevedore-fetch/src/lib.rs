//! Moving package content from a store onto a node.
//!
//! # Architecture
//!
//! Same three layers as the rest of the workspace:
//! - [`data`] - request descriptions
//! - [`core`] - pure backoff arithmetic
//! - [`effects`] - the [`ContentFetcher`] seam, the local store fetcher and
//!   retry timers
//!
//! Failures are reported as [`FetchError`], which every caller classifies via
//! [`FetchError::class`] to decide between contention retries, deletion
//! checks and ordinary backoff.

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use crate::core::retry_delay;
pub use data::FetchRequest;
pub use effects::{ContentFetcher, LocalStoreFetcher, RetryScheduler, RetryTimer};
pub use error::{FailureClass, FetchError};
