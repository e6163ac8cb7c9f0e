//! Baseline Tracker
//!
//! Loading a module runs its top-level code, so a freshly loaded file already
//! has non-zero counters. The tracker records those counters once per file and
//! resets the store back to them, never to zero.

use crate::model::CounterSnapshot;
use crate::store::CoverageStore;
use std::collections::BTreeMap;

/// Per-file counter snapshots taken right after each file's first load
#[derive(Debug, Clone, Default)]
pub struct BaselineTracker {
    baselines: BTreeMap<String, CounterSnapshot>,
}

impl BaselineTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `path`'s counters unless a baseline already exists.
    ///
    /// Returns `true` when a snapshot was taken. A file the store does not
    /// track is left alone.
    pub fn capture_if_absent(&mut self, store: &CoverageStore, path: &str) -> bool {
        if self.baselines.contains_key(path) {
            return false;
        }
        let Some(file) = store.get(path) else {
            return false;
        };
        self.baselines.insert(path.to_string(), file.counters());
        true
    }

    /// Put every baselined file back to its snapshot and evict files without one
    pub fn restore(&self, store: &mut CoverageStore) {
        for (path, snapshot) in &self.baselines {
            if let Some(file) = store.get_mut(path) {
                file.restore_counters(snapshot);
            }
        }
        store.retain(|path| self.baselines.contains_key(path));
    }

    /// Baseline recorded for `path`
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&CounterSnapshot> {
        self.baselines.get(path)
    }

    /// Whether `path` has a baseline
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.baselines.contains_key(path)
    }

    /// Number of baselined files
    #[must_use]
    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    /// Whether no baseline has been captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}
