//! I/O and timers.

mod fetcher;
mod local_store;
mod scheduler;

pub use fetcher::ContentFetcher;
pub use local_store::LocalStoreFetcher;
pub use scheduler::{RetryScheduler, RetryTimer};
