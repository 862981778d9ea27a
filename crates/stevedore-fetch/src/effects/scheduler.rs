use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Spawns one-shot timers on the current tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryScheduler;

impl RetryScheduler {
    pub fn new() -> Self { Self }

    /// Run `callback` after `delay` unless the returned timer is cancelled first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, delay: Duration, callback: F) -> RetryTimer
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let timer = RetryTimer {
            state: Arc::new(AtomicU8::new(PENDING)),
            token: CancellationToken::new(),
        };

        let state = Arc::clone(&timer.state);
        let token = timer.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if state
                        .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        callback().await;
                    }
                }
            }
        });

        timer
    }
}

/// Handle to a scheduled callback.
///
/// Firing and cancelling race on a single atomic state, so exactly one of
/// them wins. Dropping the handle cancels a timer that has not fired.
#[must_use = "dropping a RetryTimer cancels it"]
#[derive(Debug)]
pub struct RetryTimer {
    state: Arc<AtomicU8>,
    token: CancellationToken,
}

impl RetryTimer {
    /// Prevent the callback from running.
    ///
    /// Returns `true` if this call stopped a pending timer, `false` if it had
    /// already fired or been cancelled.
    pub fn cancel(&self) -> bool {
        let stopped = self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        self.token.cancel();
        stopped
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) { self.cancel(); }
}
