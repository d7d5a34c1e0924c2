use crate::stats::ShardStats;
use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;
use tracing::trace;

pub(crate) type Table<K, V> = HashMap<K, Arc<V>>;

/// A single shard: one hash table behind its own read-write lock.
///
/// The table is only ever touched while this shard's lock is held, and no
/// method here acquires any other shard's lock.
pub(crate) struct Shard<K, V> {
    table: RwLock<Table<K, V>>,
    stats: ShardStats,
}

impl<K, V> Shard<K, V>
where
    K: Hash + Eq,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            table: RwLock::new(HashMap::with_capacity(capacity)),
            stats: ShardStats::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Table<K, V>> {
        #[cfg(feature = "lock-timing")]
        let start = std::time::Instant::now();
        let guard = self.table.read();
        #[cfg(feature = "lock-timing")]
        self.stats.record_lock_wait(start.elapsed().as_nanos() as u64);
        self.stats.record_lock_acquisition();
        guard
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table<K, V>> {
        #[cfg(feature = "lock-timing")]
        let start = std::time::Instant::now();
        let guard = self.table.write();
        #[cfg(feature = "lock-timing")]
        self.stats.record_lock_wait(start.elapsed().as_nanos() as u64);
        self.stats.record_lock_acquisition();
        guard
    }

    /// Get a value by key, returning an Arc to enable zero-copy access.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let result = self.read().get(key).cloned();
        if result.is_some() {
            self.stats.record_read();
        }
        result
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read().contains_key(key)
    }

    /// Insert a key-value pair, returning the previous value if any.
    pub fn set(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        let result = self.write().insert(key, value);
        self.stats.record_write();
        result
    }

    /// Remove a key-value pair, returning the value if it existed.
    pub fn delete<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let result = self.write().remove(key);
        if result.is_some() {
            self.stats.record_remove();
        }
        result
    }

    /// Write `value` speculatively, let `accept` inspect the previous value,
    /// and undo the write if it says no.
    ///
    /// The write lock is held across the callback. A new key is only written
    /// once accepted, which no other caller can tell apart from a rollback.
    pub fn set_accept<F>(&self, key: K, value: Arc<V>, accept: F) -> Option<Arc<V>>
    where
        F: FnOnce(Option<&V>) -> bool,
    {
        let mut table = self.write();
        match table.entry(key) {
            Entry::Occupied(mut entry) => {
                let prev = entry.insert(value);
                if accept(Some(prev.as_ref())) {
                    self.stats.record_write();
                    return Some(prev);
                }
                // Put the replaced value back.
                entry.insert(prev);
                self.rolled_back("set", true);
                None
            }
            Entry::Vacant(entry) => {
                if accept(None) {
                    entry.insert(value);
                    self.stats.record_write();
                } else {
                    self.rolled_back("set", false);
                }
                None
            }
        }
    }

    /// Remove `key` speculatively, let `accept` inspect the removed value,
    /// and re-insert it if it says no.
    ///
    /// The write lock is held across the callback. The callback still runs
    /// when the key is absent, with `None`.
    pub fn delete_accept<Q, F>(&self, key: &Q, accept: F) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(Option<&V>) -> bool,
    {
        let mut table = self.write();
        let Some((owned_key, prev)) = table.remove_entry(key) else {
            accept(None);
            return None;
        };
        if accept(Some(prev.as_ref())) {
            self.stats.record_remove();
            return Some(prev);
        }
        table.insert(owned_key, prev);
        self.rolled_back("delete", true);
        None
    }

    fn rolled_back(&self, op: &'static str, existed: bool) {
        self.stats.record_rollback();
        trace!(op, existed, "accept callback rejected change, rolled back");
    }

    /// Number of entries in this shard.
    ///
    /// Takes the exclusive lock so the count excludes in-flight writers.
    pub fn len(&self) -> usize {
        self.write().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Replace the table with a fresh, empty one.
    pub fn reset(&self, capacity: usize) {
        *self.write() = HashMap::with_capacity(capacity);
    }

    /// Visit every entry under the read lock. Returns `false` if `visit`
    /// asked to stop.
    pub fn scan<F>(&self, visit: &mut F) -> bool
    where
        F: FnMut(&K, &V) -> bool,
    {
        let table = self.read();
        table.iter().all(|(key, value)| visit(key, value.as_ref()))
    }

    /// Copy out every entry under the read lock.
    pub fn entries(&self) -> Vec<(K, Arc<V>)>
    where
        K: Clone,
    {
        let table = self.read();
        table
            .iter()
            .map(|(key, value)| (key.clone(), Arc::clone(value)))
            .collect()
    }

    /// Get a snapshot of statistics for this shard.
    pub fn stats(&self) -> crate::stats::ShardOps {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard() -> Shard<String, i32> {
        Shard::new(4)
    }

    #[test]
    fn test_set_accept_reject_new_key() {
        let shard = shard();
        let mut saw_prev = true;
        let result = shard.set_accept("a".into(), Arc::new(1), |prev| {
            saw_prev = prev.is_some();
            false
        });
        assert!(result.is_none());
        assert!(!saw_prev);
        assert!(shard.get("a").is_none());
        assert_eq!(shard.len(), 0);
    }

    #[test]
    fn test_set_accept_new_key() {
        let shard = shard();
        assert!(shard.set_accept("a".into(), Arc::new(1), |prev| prev.is_none()).is_none());
        assert_eq!(*shard.get("a").unwrap(), 1);
        assert_eq!(shard.len(), 1);

        // A rejected insert of another key leaves the accepted one alone.
        assert!(shard.set_accept("b".into(), Arc::new(2), |_| false).is_none());
        assert!(shard.get("b").is_none());
        assert_eq!(shard.entries().len(), 1);
    }

    #[test]
    fn test_set_accept_reject_existing_key() {
        let shard = shard();
        shard.set("a".into(), Arc::new(1));
        let result = shard.set_accept("a".into(), Arc::new(2), |prev| {
            assert_eq!(prev, Some(&1));
            false
        });
        assert!(result.is_none());
        assert_eq!(*shard.get("a").unwrap(), 1);
    }

    #[test]
    fn test_set_accept_keeps_original_arc() {
        let shard = shard();
        let original = Arc::new(1);
        shard.set("a".into(), Arc::clone(&original));
        shard.set_accept("a".into(), Arc::new(2), |_| false);
        assert!(Arc::ptr_eq(&original, &shard.get("a").unwrap()));
    }

    #[test]
    fn test_delete_accept_absent_key_calls_back() {
        let shard = shard();
        let mut called = false;
        let result = shard.delete_accept("missing", |prev| {
            called = true;
            assert!(prev.is_none());
            true
        });
        assert!(called);
        assert!(result.is_none());
    }

    #[test]
    fn test_delete_accept_reject_restores() {
        let shard = shard();
        shard.set("a".into(), Arc::new(7));
        assert!(shard.delete_accept("a", |_| false).is_none());
        assert_eq!(*shard.get("a").unwrap(), 7);
        assert_eq!(*shard.delete_accept("a", |_| true).unwrap(), 7);
        assert!(shard.is_empty());
    }

    #[test]
    fn test_scan_stops_early() {
        let shard = shard();
        for i in 0..10 {
            shard.set(format!("k{i}"), Arc::new(i));
        }
        let mut visited = 0;
        let finished = shard.scan(&mut |_, _| {
            visited += 1;
            visited < 3
        });
        assert!(!finished);
        assert_eq!(visited, 3);
    }

    #[test]
    fn test_reset() {
        let shard = shard();
        shard.set("a".into(), Arc::new(1));
        shard.reset(16);
        assert_eq!(shard.len(), 0);
        assert!(shard.entries().is_empty());
    }
}
