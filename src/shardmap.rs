use crate::config::{create_hasher, default_shard_count, Config, RoutingConfig};
use crate::hash::ShardHasher;
use crate::iter::Iter;
use crate::shard::Shard;
use crate::stats::{ShardOps, Stats};
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Lazily initialized, sharded, thread-safe map.
///
/// Keys are spread across independently locked shards by a seeded hash.
/// Operations on different shards never block each other; reads on the
/// same shard share its lock, writes take it exclusively. Values are
/// wrapped in `Arc<V>` so reads hand them out without copying.
///
/// Nothing is allocated until the first operation. At that point the
/// shard count, the hash seed and the shard tables are fixed for the
/// lifetime of the map.
///
/// # Example
///
/// ```rust
/// use lazyshard::ShardMap;
///
/// let map = ShardMap::new();
/// map.set("key1", "value1");
///
/// if let Some(value) = map.get(&"key1") {
///     println!("Found: {}", *value);
/// }
/// ```
pub struct ShardMap<K, V> {
    config: Config,
    inner: OnceLock<Shards<K, V>>,
}

/// State fixed at initialization. Read-only afterwards, apart from the
/// contents of each shard's table.
struct Shards<K, V> {
    shards: Box<[Shard<K, V>]>,
    hasher: ShardHasher,
    seed: u64,
    capacity_per_shard: usize,
}

impl<K, V> Shards<K, V>
where
    K: Hash + Eq,
{
    fn new(config: &Config) -> Self {
        let shard_count = config.shard_count.unwrap_or_else(default_shard_count);
        let seed = config.seed.unwrap_or_else(rand::random);
        let capacity_per_shard = config.capacity / shard_count;

        let shards = (0..shard_count)
            .map(|_| Shard::new(capacity_per_shard))
            .collect();

        debug!(shard_count, capacity_per_shard, "initialized shard map");

        Self {
            shards,
            hasher: create_hasher(config.hash_function, seed),
            seed,
            capacity_per_shard,
        }
    }
}

impl<K, V> ShardMap<K, V>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
{
    /// Create a new map with defaults (automatic shard count, random seed, ahash).
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new map whose total capacity hint is `capacity`.
    ///
    /// The hint is divided evenly across shards when the map initializes
    /// and again on every [`clear`](Self::clear). Those tables are allocated
    /// eagerly at that point, so an oversized hint is not reported here: it
    /// aborts or panics on first use, and every later call fails the same
    /// way because initialization never completes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(Config::default().capacity(capacity))
    }

    /// Create a new map with custom config.
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            inner: OnceLock::new(),
        }
    }

    /// Initialize on first use. Concurrent first callers block until one
    /// of them has built the shards.
    #[inline]
    fn shards(&self) -> &Shards<K, V> {
        self.inner.get_or_init(|| Shards::new(&self.config))
    }

    #[inline]
    fn shard_index<Q>(shards: &Shards<K, V>, routing: &RoutingConfig, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        let hash = shards.hasher.hash_key(key);
        let index = routing.route(hash, shards.shards.len());
        debug_assert!(
            index < shards.shards.len(),
            "shard router returned index {} for {} shards; routers must return a value in [0, shard_count)",
            index,
            shards.shards.len()
        );
        index
    }

    /// Figure out which shard this key belongs to.
    #[inline]
    fn shard_for<Q>(&self, key: &Q) -> &Shard<K, V>
    where
        Q: Hash + ?Sized,
    {
        let shards = self.shards();
        &shards.shards[Self::shard_index(shards, &self.config.routing, key)]
    }

    /// Whether the map has been initialized yet. Does not initialize it.
    pub fn is_initialized(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Number of shards. Initializes the map.
    pub fn shard_count(&self) -> usize {
        self.shards().shards.len()
    }

    /// The hash seed in use. Initializes the map.
    pub fn seed(&self) -> u64 {
        self.shards().seed
    }

    /// Index of the shard that owns `key`. Initializes the map.
    pub fn shard_of<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Self::shard_index(self.shards(), &self.config.routing, key)
    }

    /// Get a value by key. Returns an `Arc<V>` so you can share it without copying.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lazyshard::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// map.set("key", "value");
    ///
    /// assert_eq!(*map.get(&"key").unwrap(), "value");
    /// assert!(map.get(&"missing").is_none());
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard_for(key).get(key)
    }

    /// Check if a key exists without cloning the value.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard_for(key).contains_key(key)
    }

    /// Set a key to a value. Returns the previous value if the key existed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lazyshard::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// assert!(map.set("key", "value").is_none());
    /// assert_eq!(*map.set("key", "new_value").unwrap(), "value");
    /// ```
    pub fn set(&self, key: K, value: V) -> Option<Arc<V>> {
        self.shard_for(&key).set(key, Arc::new(value))
    }

    /// Set a key to a value, letting `accept` inspect the previous value
    /// (if any) and veto the change.
    ///
    /// The value is written first, then `accept` is called with the value it
    /// replaced. If `accept` returns `false` the shard is restored to exactly
    /// its prior state and `None` is returned. Otherwise the previous value
    /// is returned as with [`set`](Self::set).
    ///
    /// The shard's write lock is held for the whole call, callback included,
    /// so no other thread can observe the tentative value or write to the
    /// shard meanwhile. `accept` must not call back into this map: doing so
    /// deadlocks. If `accept` panics the tentative write is kept.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lazyshard::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// map.set("version", 3);
    ///
    /// // Only move forward.
    /// let prev = map.set_accept("version", 2, |prev| prev.map_or(true, |p| *p < 2));
    /// assert!(prev.is_none());
    /// assert_eq!(*map.get(&"version").unwrap(), 3);
    /// ```
    pub fn set_accept<F>(&self, key: K, value: V, accept: F) -> Option<Arc<V>>
    where
        F: FnOnce(Option<&V>) -> bool,
    {
        self.shard_for(&key).set_accept(key, Arc::new(value), accept)
    }

    /// Delete a key, returning the value if it existed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lazyshard::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// map.set("key", "value");
    /// assert_eq!(*map.delete(&"key").unwrap(), "value");
    /// assert!(map.get(&"key").is_none());
    /// assert!(map.delete(&"key").is_none());
    /// ```
    pub fn delete<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard_for(key).delete(key)
    }

    /// Delete a key, letting `accept` inspect the removed value (if any)
    /// and veto the change.
    ///
    /// `accept` is called with `None` when the key is absent. On rejection
    /// the removed entry is put back and `None` is returned. The locking
    /// rules of [`set_accept`](Self::set_accept) apply.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lazyshard::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// map.set("lease", 0);
    ///
    /// // Only release a lease nobody renewed.
    /// assert!(map.delete_accept(&"lease", |v| v == Some(&1)).is_none());
    /// assert!(map.contains_key(&"lease"));
    /// assert_eq!(*map.delete_accept(&"lease", |v| v == Some(&0)).unwrap(), 0);
    /// ```
    pub fn delete_accept<Q, F>(&self, key: &Q, accept: F) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(Option<&V>) -> bool,
    {
        self.shard_for(key).delete_accept(key, accept)
    }

    /// Get the total number of entries across all shards.
    ///
    /// Each shard is locked in turn, never all at once, so with concurrent
    /// writers the total may combine shards counted at different moments.
    pub fn len(&self) -> usize {
        self.shards().shards.iter().map(|shard| shard.len()).sum()
    }

    /// Check if the map is empty. Same consistency as [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.shards().shards.iter().all(|shard| shard.is_empty())
    }

    /// Remove every entry.
    ///
    /// Shards are emptied one at a time, each replaced by a fresh table of
    /// `capacity / shard_count` slots. A concurrent reader may still see
    /// entries in shards not yet reached. Shard count and seed are kept.
    pub fn clear(&self) {
        let shards = self.shards();
        for shard in shards.shards.iter() {
            shard.reset(shards.capacity_per_shard);
        }
        debug!(shard_count = shards.shards.len(), "cleared shard map");
    }

    /// Visit every entry, shard by shard, until `visit` returns `false`.
    ///
    /// Each shard's read lock is held while its entries are visited, so
    /// `visit` must not write to this map. Writers on other shards may run
    /// between shards; the pass is not a snapshot.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lazyshard::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// for i in 0..10 {
    ///     map.set(i, i * 2);
    /// }
    ///
    /// let mut seen = 0;
    /// map.range(|_, _| {
    ///     seen += 1;
    ///     seen < 4
    /// });
    /// assert_eq!(seen, 4);
    /// ```
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        for shard in self.shards().shards.iter() {
            if !shard.scan(&mut visit) {
                break;
            }
        }
    }

    /// Lazily iterate over all key-value pairs in shard order.
    ///
    /// A shard is read (under its lock) only when the iterator reaches it,
    /// and no lock is held between calls to `next`. Setting or deleting
    /// while iterating is unsupported: entries may then be missed or
    /// repeated. Each call starts a fresh pass.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lazyshard::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// map.set("key1", "value1");
    /// map.set("key2", "value2");
    ///
    /// assert_eq!(map.iter().count(), 2);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V>
    where
        K: Clone,
    {
        Iter::new(&self.shards().shards)
    }

    /// Get detailed statistics about the map and its shards.
    pub fn stats(&self) -> Stats {
        let shards = &self.shards().shards;
        let shard_sizes: Vec<usize> = shards.iter().map(|s| s.len()).collect();
        let operations: Vec<ShardOps> = shards.iter().map(|s| s.stats()).collect();
        let size: usize = shard_sizes.iter().sum();

        Stats {
            size,
            shard_sizes,
            operations,
        }
    }

    /// Number of entries in each shard, in shard order.
    pub fn shard_loads(&self) -> Vec<usize> {
        self.shards().shards.iter().map(|s| s.len()).collect()
    }
}

impl<K, V> Default for ShardMap<K, V>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, K, V> IntoIterator for &'a ShardMap<K, V>
where
    K: Hash + Eq + Send + Sync + Clone,
    V: Send + Sync,
{
    type Item = (K, Arc<V>);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V> std::fmt::Debug for ShardMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("ShardMap");
        match self.inner.get() {
            Some(shards) => out.field("shard_count", &shards.shards.len()),
            None => out.field("shard_count", &"uninitialized"),
        };
        out.finish_non_exhaustive()
    }
}
