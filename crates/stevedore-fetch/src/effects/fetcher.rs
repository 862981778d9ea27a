use std::time::Duration;

use async_trait::async_trait;

use crate::{FetchError, FetchRequest};

/// Brings content from a package store onto the node.
///
/// Implementations must be idempotent: repeating a request with the same
/// arguments converges on the same destination contents. They classify their
/// own failures through [`FetchError`] and must return within `timeout`.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest, timeout: Duration) -> Result<(), FetchError>;
}
