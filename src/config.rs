use crate::error::{Error, Result};
use crate::hash::ShardHasher;

/// Which hash function to use for shard assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashFunction {
    /// Use ahash (default, fast and well-distributed).
    #[default]
    AHash,
    /// Use fxhash (faster but potentially less distributed).
    #[cfg(feature = "fxhash")]
    FxHash,
}

/// User-provided shard selection.
///
/// Implementations must be pure: the same `(key_hash, shard_count)` has to
/// produce the same index for the lifetime of the map, or stored keys
/// become unreachable.
pub trait ShardRouter: Send + Sync {
    /// Return the shard index in `[0, shard_count)` for the given key hash.
    fn route(&self, key_hash: u64, shard_count: usize) -> usize;
}

/// Default routing: `(hash as usize) & (shard_count - 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRouter;

impl ShardRouter for DefaultRouter {
    #[inline]
    fn route(&self, key_hash: u64, shard_count: usize) -> usize {
        (key_hash as usize) & (shard_count - 1)
    }
}

/// Routing strategy for shard selection.
#[derive(Default)]
pub enum RoutingConfig {
    /// Default: hash & (shard_count - 1).
    #[default]
    Default,
    /// User-provided router.
    Custom(Box<dyn ShardRouter>),
}

impl RoutingConfig {
    #[inline]
    pub(crate) fn route(&self, key_hash: u64, shard_count: usize) -> usize {
        match self {
            RoutingConfig::Default => DefaultRouter.route(key_hash, shard_count),
            RoutingConfig::Custom(router) => router.route(key_hash, shard_count),
        }
    }
}

impl std::fmt::Debug for RoutingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingConfig::Default => write!(f, "RoutingConfig::Default"),
            RoutingConfig::Custom(_) => write!(f, "RoutingConfig::Custom(...)"),
        }
    }
}

/// Configuration for a ShardMap instance.
///
/// Every field left unset is resolved when the map is first used, not
/// when it is built.
#[derive(Debug, Default)]
pub struct Config {
    pub(crate) shard_count: Option<usize>,
    pub(crate) capacity: usize,
    pub(crate) seed: Option<u64>,
    pub(crate) hash_function: HashFunction,
    pub(crate) routing: RoutingConfig,
}

impl Config {
    /// Create a new config with defaults (automatic shard count, random seed, ahash).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of shards. Must be a power of two and greater than 0.
    ///
    /// Without this, the shard count is derived from the available
    /// parallelism at first use.
    pub fn shard_count(mut self, count: usize) -> Result<Self> {
        if count == 0 || !count.is_power_of_two() {
            return Err(Error::InvalidShardCount { count });
        }
        self.shard_count = Some(count);
        Ok(self)
    }

    /// Set the total capacity hint. It is divided evenly across shards.
    ///
    /// The shard tables are allocated with this capacity at first use, not
    /// here; an oversized hint fails there.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Fix the hash seed instead of drawing a random one.
    ///
    /// Two maps with the same seed, shard count and hash function place
    /// every key in the same shard.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the hash function to use.
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.hash_function = hash_fn;
        self
    }

    /// Use a custom shard router.
    pub fn routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = routing;
        self
    }
}

/// Builder for creating a ShardMap with custom configuration.
#[derive(Debug, Default)]
pub struct ShardMapBuilder {
    config: Config,
}

impl ShardMapBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of shards. Must be a power of two and greater than 0.
    pub fn shard_count(mut self, count: usize) -> Result<Self> {
        self.config = self.config.shard_count(count)?;
        Ok(self)
    }

    /// Set the total capacity hint, divided evenly across shards.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.capacity(capacity);
        self
    }

    /// Fix the hash seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config = self.config.seed(seed);
        self
    }

    /// Set the hash function to use.
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.config = self.config.hash_function(hash_fn);
        self
    }

    /// Use a custom shard router.
    pub fn routing(mut self, routing: RoutingConfig) -> Self {
        self.config = self.config.routing(routing);
        self
    }

    /// Build a ShardMap with the configured settings. Nothing is allocated
    /// until the map is first used.
    pub fn build<K, V>(self) -> crate::ShardMap<K, V>
    where
        K: std::hash::Hash + Eq + Send + Sync,
        V: Send + Sync,
    {
        crate::ShardMap::with_config(self.config)
    }
}

/// Shards allocated per unit of available parallelism.
const SHARDS_PER_CPU: usize = 16;

/// Smallest power of two >= available parallelism * 16.
pub(crate) fn default_shard_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    cpus.saturating_mul(SHARDS_PER_CPU).next_power_of_two()
}

/// Create a hash function instance based on the configuration.
pub(crate) fn create_hasher(hash_fn: HashFunction, seed: u64) -> ShardHasher {
    match hash_fn {
        HashFunction::AHash => ShardHasher::ahash(seed),
        #[cfg(feature = "fxhash")]
        HashFunction::FxHash => ShardHasher::FxHash { seed },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shard_count_is_power_of_two() {
        let count = default_shard_count();
        assert!(count.is_power_of_two());
        assert!(count >= SHARDS_PER_CPU);
    }

    #[test]
    fn test_invalid_shard_count() {
        assert_eq!(
            Config::new().shard_count(6).unwrap_err(),
            Error::InvalidShardCount { count: 6 }
        );
        assert!(Config::new().shard_count(0).is_err());
        assert!(Config::new().shard_count(1).is_ok());
    }

    #[test]
    fn test_default_router_masks() {
        assert_eq!(DefaultRouter.route(0b1011, 4), 0b11);
        assert_eq!(DefaultRouter.route(u64::MAX, 1), 0);
    }
}
