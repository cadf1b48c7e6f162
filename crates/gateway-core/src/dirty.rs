//! Unapplied-changes tracking.
//!
//! Every component that mutates gateway configuration marks its own source
//! dirty when the local edit happens, and marks it synced once the backend
//! confirms that source's state. The tracker is dirty while any source is.
//! A successful config apply clears every source at once.
//!
//! Views poll [`DirtyTracker::revision`] to notice changes cheaply.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared "local edits not yet applied" state, keyed by source.
///
/// Cloning is cheap and every clone observes the same state.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    sources: Mutex<BTreeSet<String>>,
    revision: AtomicU64,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local edit from `source` the backend has not confirmed yet.
    pub fn mark_dirty(&self, source: &str) {
        let was_dirty = {
            let mut sources = self.sources();
            let was_dirty = !sources.is_empty();
            sources.insert(source.to_string());
            was_dirty
        };
        if !was_dirty {
            self.bump();
        }
    }

    /// Record that the backend confirmed the current state of `source`.
    ///
    /// Other sources stay dirty.
    pub fn mark_synced(&self, source: &str) {
        let cleared = {
            let mut sources = self.sources();
            sources.remove(source) && sources.is_empty()
        };
        if cleared {
            self.bump();
        }
    }

    /// Record that the backend confirmed everything, e.g. after a config apply.
    pub fn mark_all_synced(&self) {
        let cleared = {
            let mut sources = self.sources();
            let was_dirty = !sources.is_empty();
            sources.clear();
            was_dirty
        };
        if cleared {
            self.bump();
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.sources().is_empty()
    }

    pub fn is_source_dirty(&self, source: &str) -> bool {
        self.sources().contains(source)
    }

    /// Sources with unconfirmed edits, in name order.
    pub fn dirty_sources(&self) -> Vec<String> {
        self.sources().iter().cloned().collect()
    }

    /// Counter bumped whenever [`is_dirty`](Self::is_dirty) flips.
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::Acquire)
    }

    fn sources(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.inner
            .sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.inner.revision.fetch_add(1, Ordering::AcqRel);
    }
}
