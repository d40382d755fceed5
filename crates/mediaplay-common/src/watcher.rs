//! Non-owning watcher registry.
//!
//! Sequencers and sound players notify observers without owning them. The
//! registry keeps [`Weak`] handles, so a watcher that is dropped by its owner
//! silently falls out of the set. Membership is by identity: adding the same
//! `Arc` twice registers it once, and removal is idempotent.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Registry of weakly-held watchers.
pub struct WatcherSet<W: ?Sized> {
    entries: Mutex<Vec<Weak<W>>>,
}

impl<W: ?Sized> WatcherSet<W> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register a watcher. Returns `false` if it was already registered.
    pub fn add(&self, watcher: &Arc<W>) -> bool {
        let weak = Arc::downgrade(watcher);
        let mut entries = self.entries.lock();
        entries.retain(|entry| entry.strong_count() > 0);
        if entries.iter().any(|entry| Weak::ptr_eq(entry, &weak)) {
            return false;
        }
        entries.push(weak);
        true
    }

    /// Unregister a watcher. Returns `false` if it was not registered.
    pub fn remove(&self, watcher: &Arc<W>) -> bool {
        let weak = Arc::downgrade(watcher);
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| !Weak::ptr_eq(entry, &weak));
        entries.len() != before
    }

    /// Whether the given watcher is currently registered.
    pub fn contains(&self, watcher: &Arc<W>) -> bool {
        let weak = Arc::downgrade(watcher);
        self.entries
            .lock()
            .iter()
            .any(|entry| Weak::ptr_eq(entry, &weak))
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of watchers that are still alive.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    /// Whether no live watcher is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Strong handles to every live watcher, pruning dead entries.
    ///
    /// The internal lock is released before this returns, so callers may
    /// invoke watchers that re-enter the registry.
    pub fn snapshot(&self) -> Vec<Arc<W>> {
        let mut entries = self.entries.lock();
        entries.retain(|entry| entry.strong_count() > 0);
        entries.iter().filter_map(Weak::upgrade).collect()
    }

    /// Invoke `f` for each live watcher, outside the registry lock.
    pub fn notify(&self, mut f: impl FnMut(&W)) {
        for watcher in self.snapshot() {
            f(&*watcher);
        }
    }
}

impl<W: ?Sized> Default for WatcherSet<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: ?Sized> std::fmt::Debug for WatcherSet<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherSet")
            .field("live", &self.len())
            .finish()
    }
}
