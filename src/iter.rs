use crate::shard::Shard;
use std::hash::Hash;
use std::iter::FusedIterator;
use std::sync::Arc;

/// Lazy iterator over every entry of a ShardMap, in shard order.
///
/// Entries of a shard are copied out under that shard's read lock when the
/// iterator first reaches it; the lock is released before any entry is
/// yielded. Shards further along are not touched until needed, so
/// dropping the iterator early skips them entirely.
///
/// Writes made while iterating may or may not be observed, and a key moved
/// by delete-then-set can be missed or yielded twice.
pub struct Iter<'a, K, V> {
    shards: &'a [Shard<K, V>],
    next_shard: usize,
    buffer: std::vec::IntoIter<(K, Arc<V>)>,
}

impl<'a, K, V> Iter<'a, K, V>
where
    K: Hash + Eq + Clone,
{
    pub(crate) fn new(shards: &'a [Shard<K, V>]) -> Self {
        Self {
            shards,
            next_shard: 0,
            buffer: Vec::new().into_iter(),
        }
    }

    /// Load the next non-empty shard into the buffer.
    fn fill_buffer(&mut self) -> bool {
        while let Some(shard) = self.shards.get(self.next_shard) {
            self.next_shard += 1;
            let entries = shard.entries();
            if !entries.is_empty() {
                self.buffer = entries.into_iter();
                return true;
            }
        }
        false
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V>
where
    K: Hash + Eq + Clone,
{
    type Item = (K, Arc<V>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(item);
            }
            if !self.fill_buffer() {
                return None;
            }
        }
    }
}

impl<'a, K, V> FusedIterator for Iter<'a, K, V> where K: Hash + Eq + Clone {}
