use std::hash::{BuildHasher, Hash, Hasher};

/// Seeded hash function used for shard assignment.
///
/// The seed is fixed when the map initializes, so a key hashes to the
/// same value for the whole lifetime of the map. Different seeds give
/// unrelated placements, which keeps adversarial key sets from piling
/// into a single shard.
pub enum ShardHasher {
    /// ahash keyed from the map seed (default).
    AHash(ahash::RandomState),
    /// FxHash with the seed written ahead of the key.
    #[cfg(feature = "fxhash")]
    FxHash {
        /// Seed mixed into every hash.
        seed: u64,
    },
}

impl ShardHasher {
    /// Build the default (ahash) hasher for a seed.
    pub fn ahash(seed: u64) -> Self {
        let k0 = seed;
        let k1 = seed.rotate_left(32) ^ 0x9E37_79B9_7F4A_7C15;
        let k2 = seed.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        let k3 = !seed;
        ShardHasher::AHash(ahash::RandomState::with_seeds(k0, k1, k2, k3))
    }

    /// Hash a key to determine which shard it belongs to.
    pub fn hash_key<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        match self {
            ShardHasher::AHash(state) => {
                let mut hasher = state.build_hasher();
                key.hash(&mut hasher);
                hasher.finish()
            }
            #[cfg(feature = "fxhash")]
            ShardHasher::FxHash { seed } => {
                let mut hasher = fxhash::FxHasher64::default();
                hasher.write_u64(*seed);
                key.hash(&mut hasher);
                hasher.finish()
            }
        }
    }
}
