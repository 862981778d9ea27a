use crate::{OperationState, OperationStatus, StartError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Entry<H> {
    status: OperationStatus,
    handle: H,
}

struct Inner<H> {
    entries: HashMap<String, Entry<H>>,
    closed:  bool,
}

/// Registry of in-flight operations keyed by download key.
///
/// Admission is the dedup gate: [`start`](Self::start) succeeds for exactly
/// one caller per key until that caller [`remove`](Self::remove)s it. Each
/// entry carries an owning handle (typically a cancellation token) that is
/// returned from [`close`](Self::close) so the owner can be told to stop.
pub struct PendingOperationMap<H> {
    inner: Mutex<Inner<H>>,
}

impl<H: Clone> PendingOperationMap<H> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                closed:  false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<H>> { self.inner.lock().unwrap_or_else(PoisonError::into_inner) }

    pub fn start(&self, key: impl Into<String>, status: OperationStatus, handle: H) -> Result<(), StartError> {
        let key = key.into();
        let mut inner = self.lock();
        if inner.closed {
            return Err(StartError::Closed);
        }
        if let Some(existing) = inner.entries.get(&key) {
            tracing::debug!(key = %key, status = %existing.status, "operation already pending");
            return Err(StartError::AlreadyExists(existing.status.clone()));
        }
        inner.entries.insert(key, Entry { status, handle });
        Ok(())
    }

    pub fn get_status(&self, key: &str) -> Option<OperationStatus> {
        self.lock().entries.get(key).map(|entry| entry.status.clone())
    }

    /// Replace the counters and last error of `key`. The state never moves
    /// backwards. Absent keys are ignored; the map may have closed first.
    pub fn update_status(&self, key: &str, status: OperationStatus) {
        if let Some(entry) = self.lock().entries.get_mut(key) {
            let state = entry.status.state.max(status.state);
            entry.status = OperationStatus { state, ..status };
        }
    }

    /// Record the final status of `key`. It stays observable until removed.
    pub fn complete(&self, key: &str, status: OperationStatus) {
        if let Some(entry) = self.lock().entries.get_mut(key) {
            entry.status = OperationStatus {
                state: OperationState::Completed,
                ..status
            };
        }
    }

    pub fn remove(&self, key: &str) -> Option<OperationStatus> {
        self.lock().entries.remove(key).map(|entry| entry.status)
    }

    /// Refuse further admissions and return the handles of every entry.
    ///
    /// Entries stay in place; their owners remove them as they wind down.
    pub fn close(&self) -> Vec<H> {
        let mut inner = self.lock();
        inner.closed = true;
        inner.entries.values().map(|entry| entry.handle.clone()).collect()
    }

    pub fn is_closed(&self) -> bool { self.lock().closed }

    pub fn len(&self) -> usize { self.lock().entries.len() }

    pub fn is_empty(&self) -> bool { self.lock().entries.is_empty() }

    pub fn contains(&self, key: &str) -> bool { self.lock().entries.contains_key(key) }

    /// Keys and owning handles of every entry, sorted by key.
    pub fn handles(&self) -> Vec<(String, H)> {
        let mut handles: Vec<_> = self
            .lock()
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.handle.clone()))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        handles
    }
}

impl<H: Clone> Default for PendingOperationMap<H> {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_start_reports_existing_status() {
        let map = PendingOperationMap::new();
        map.start("Download:App1:v1", OperationStatus::in_progress(), 1u32).unwrap();

        let err = map.start("Download:App1:v1", OperationStatus::default(), 2).unwrap_err();
        assert_eq!(err, StartError::AlreadyExists(OperationStatus::in_progress()));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_update_missing_key_is_noop() {
        let map: PendingOperationMap<()> = PendingOperationMap::new();
        map.update_status("missing", OperationStatus::in_progress());
        map.complete("missing", OperationStatus::in_progress());
        assert!(map.get_status("missing").is_none());
    }

    #[test]
    fn test_update_keeps_state_monotonic() {
        let map = PendingOperationMap::new();
        map.start("k", OperationStatus::in_progress(), ()).unwrap();
        map.update_status("k", OperationStatus {
            failure_count: 1,
            ..OperationStatus::default()
        });

        let status = map.get_status("k").unwrap();
        assert_eq!(status.state, OperationState::InProgress);
        assert_eq!(status.failure_count, 1);
    }

    #[test]
    fn test_complete_then_remove() {
        let map = PendingOperationMap::new();
        map.start("k", OperationStatus::in_progress(), ()).unwrap();
        map.complete("k", OperationStatus::in_progress());
        assert!(map.get_status("k").unwrap().is_completed());

        let removed = map.remove("k").unwrap();
        assert!(removed.is_completed());
        assert!(!map.contains("k"));
        map.start("k", OperationStatus::in_progress(), ()).unwrap();
    }

    #[test]
    fn test_close_returns_handles_and_rejects_start() {
        let map = PendingOperationMap::new();
        map.start("a", OperationStatus::in_progress(), "handle-a").unwrap();
        map.start("b", OperationStatus::in_progress(), "handle-b").unwrap();

        let mut handles = map.close();
        handles.sort();
        assert_eq!(handles, vec!["handle-a", "handle-b"]);
        assert!(map.is_closed());
        assert_eq!(map.start("c", OperationStatus::in_progress(), "handle-c"), Err(StartError::Closed));
    }

    #[test]
    fn test_handles_sorted_by_key() {
        let map = PendingOperationMap::new();
        map.start("b", OperationStatus::in_progress(), "handle-b").unwrap();
        map.start("a", OperationStatus::default(), "handle-a").unwrap();

        let keys: Vec<_> = map.handles().into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
