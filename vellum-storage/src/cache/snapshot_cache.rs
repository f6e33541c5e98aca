//! Per-key map of immutable snapshot handles.
//!
//! Every operation is atomic under the key's shard lock. No operation here
//! performs I/O or fails; loading from the coordination store is the
//! coordinator's job.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use vellum_core::{Snapshot, SnapshotKey};

/// Holds the single current snapshot per key.
pub struct SnapshotCache<A> {
    entries: DashMap<SnapshotKey, Arc<Snapshot<A>>>,
}

impl<A> Default for SnapshotCache<A> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<A> SnapshotCache<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot for `key`, if one has been loaded.
    pub fn read(&self, key: &SnapshotKey) -> Option<Arc<Snapshot<A>>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Install `candidate` if it is strictly newer than the current snapshot,
    /// or if no snapshot is present.
    ///
    /// Returns the snapshot that is current once the call completes. When two
    /// refreshes race, the higher version wins regardless of which finishes
    /// first.
    pub fn swap_if_newer(&self, key: &SnapshotKey, candidate: Arc<Snapshot<A>>) -> Arc<Snapshot<A>> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if candidate.is_newer_than(occupied.get()) {
                    occupied.insert(Arc::clone(&candidate));
                    candidate
                } else {
                    Arc::clone(occupied.get())
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&candidate));
                candidate
            }
        }
    }

    /// Drop the snapshot for `key`, returning it if one was present.
    pub fn invalidate(&self, key: &SnapshotKey) -> Option<Arc<Snapshot<A>>> {
        self.entries.remove(key).map(|(_, snapshot)| snapshot)
    }

    /// All keys that currently hold a snapshot.
    pub fn keys(&self) -> Vec<SnapshotKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key() -> SnapshotKey {
        SnapshotKey::collection("books").expect("valid key")
    }

    fn snap(version: i32) -> Arc<Snapshot<&'static str>> {
        Arc::new(Snapshot::new(version, Arc::new("schema")))
    }

    #[test]
    fn test_read_absent() {
        let cache = SnapshotCache::<&str>::new();
        assert!(cache.read(&key()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_swap_installs_when_absent() {
        let cache = SnapshotCache::new();
        let current = cache.swap_if_newer(&key(), snap(3));
        assert_eq!(current.version(), 3);
        assert_eq!(cache.read(&key()).map(|s| s.version()), Some(3));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_swap_rejects_older_and_equal() {
        let cache = SnapshotCache::new();
        let installed = cache.swap_if_newer(&key(), snap(7));

        let after_older = cache.swap_if_newer(&key(), snap(5));
        assert_eq!(after_older.version(), 7);
        assert!(Arc::ptr_eq(&after_older, &installed));

        let after_equal = cache.swap_if_newer(&key(), snap(7));
        assert!(Arc::ptr_eq(&after_equal, &installed));
    }

    #[test]
    fn test_race_order_does_not_matter() {
        for order in [[5, 7], [7, 5]] {
            let cache = SnapshotCache::new();
            for v in order {
                cache.swap_if_newer(&key(), snap(v));
            }
            assert_eq!(cache.read(&key()).map(|s| s.version()), Some(7));
        }
    }

    #[test]
    fn test_reader_keeps_superseded_snapshot() {
        let cache = SnapshotCache::new();
        cache.swap_if_newer(&key(), snap(1));
        let held = cache.read(&key()).expect("loaded");

        cache.swap_if_newer(&key(), snap(2));
        assert_eq!(held.version(), 1);
        assert_eq!(cache.read(&key()).map(|s| s.version()), Some(2));
    }

    #[test]
    fn test_invalidate_and_keys() {
        let cache = SnapshotCache::new();
        let other = SnapshotKey::core("books").expect("valid key");
        cache.swap_if_newer(&key(), snap(1));
        cache.swap_if_newer(&other, snap(4));

        let mut keys = cache.keys();
        keys.sort();
        assert_eq!(keys, vec![other.clone(), key()]);

        assert_eq!(cache.invalidate(&key()).map(|s| s.version()), Some(1));
        assert!(cache.invalidate(&key()).is_none());
        assert_eq!(cache.len(), 1);

        // After eviction a lower version may be installed again.
        cache.swap_if_newer(&key(), snap(0));
        assert_eq!(cache.read(&key()).map(|s| s.version()), Some(0));
    }

    proptest! {
        /// The observed version never decreases across any swap sequence.
        #[test]
        fn prop_observed_version_monotonic(versions in prop::collection::vec(-1i32..1000, 1..64)) {
            let cache = SnapshotCache::new();
            let mut last_seen = i32::MIN;
            for v in versions {
                let current = cache.swap_if_newer(&key(), snap(v));
                prop_assert!(current.version() >= last_seen);
                prop_assert!(current.version() >= v);
                let read = cache.read(&key()).map(|s| s.version());
                prop_assert_eq!(read, Some(current.version()));
                last_seen = current.version();
            }
        }
    }
}
