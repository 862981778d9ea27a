use crate::StickyError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Inner<E> {
    entries: HashMap<String, E>,
    closed:  bool,
}

/// Terminal failures remembered per key until one caller consumes them.
///
/// Consumption is one-shot: after [`try_get_and_remove`](Self::try_get_and_remove)
/// hands an entry out, the next caller for the same key gets a fresh attempt.
pub struct StickyFailureCache<E> {
    inner: Mutex<Inner<E>>,
}

impl<E: Clone> StickyFailureCache<E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                closed:  false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<E>> { self.inner.lock().unwrap_or_else(PoisonError::into_inner) }

    pub fn try_add(&self, key: impl Into<String>, error: E) -> Result<(), StickyError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(StickyError::Closed);
        }
        match inner.entries.entry(key.into()) {
            std::collections::hash_map::Entry::Occupied(_) => Err(StickyError::AlreadyExists),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(error);
                Ok(())
            },
        }
    }

    pub fn try_get_and_remove(&self, key: &str) -> Option<E> { self.lock().entries.remove(key) }

    pub fn contains(&self, key: &str) -> bool { self.lock().entries.contains_key(key) }

    /// Discard every entry and refuse new ones. Returns how many were dropped.
    pub fn close(&self) -> usize {
        let mut inner = self.lock();
        inner.closed = true;
        let discarded = inner.entries.len();
        inner.entries.clear();
        if discarded > 0 {
            tracing::debug!(discarded, "sticky failure cache closed");
        }
        discarded
    }

    pub fn is_closed(&self) -> bool { self.lock().closed }

    pub fn len(&self) -> usize { self.lock().entries.len() }

    pub fn is_empty(&self) -> bool { self.lock().entries.is_empty() }
}

impl<E: Clone> Default for StickyFailureCache<E> {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_consumed_once() {
        let cache = StickyFailureCache::new();
        cache.try_add("Download:App1:v1", "deleted").unwrap();

        assert_eq!(cache.try_get_and_remove("Download:App1:v1"), Some("deleted"));
        assert_eq!(cache.try_get_and_remove("Download:App1:v1"), None);
    }

    #[test]
    fn test_double_add_rejected() {
        let cache = StickyFailureCache::new();
        cache.try_add("k", 1).unwrap();
        assert_eq!(cache.try_add("k", 2), Err(StickyError::AlreadyExists));
        assert_eq!(cache.try_get_and_remove("k"), Some(1));
    }

    #[test]
    fn test_close_drains() {
        let cache = StickyFailureCache::new();
        cache.try_add("a", ()).unwrap();
        cache.try_add("b", ()).unwrap();

        assert_eq!(cache.close(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.try_add("c", ()), Err(StickyError::Closed));
    }
}
