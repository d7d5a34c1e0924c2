//! # lazyshard
//!
//! A thread-safe map split into independently locked shards.
//!
//! Every key is routed to one shard by a seeded hash. Each shard is a
//! plain hash table behind a read-write lock, so operations on different
//! shards never contend and reads of the same shard run in parallel.
//! The shards are only allocated on first use, and the shard count and
//! seed stay fixed from then on. Values are stored behind `Arc<V>` so
//! reads share them without copying.
//!
//! ## Features
//!
//! - **Lazy**: construction is free; the first operation builds the shards
//! - **Sharded**: one `RwLock` per shard, sized from the available parallelism
//! - **Accept/reject updates**: inspect the previous value under the shard
//!   lock and veto a set or delete, with exact rollback
//! - **Seeded routing**: shard placement is unpredictable across runs
//! - **Statistics**: optional per-shard counters (`metrics` feature)
//!
//! ## Example
//!
//! ```rust
//! use lazyshard::ShardMap;
//!
//! let map = ShardMap::new();
//!
//! map.set("a", 1);
//! map.set("b", 2);
//! map.set("c", 3);
//! assert_eq!(map.len(), 3);
//!
//! // Only overwrite with larger values.
//! map.set_accept("b", 1, |prev| prev.map_or(true, |p| *p < 1));
//! assert_eq!(*map.get(&"b").unwrap(), 2);
//!
//! assert_eq!(*map.delete(&"b").unwrap(), 2);
//! assert_eq!(map.len(), 2);
//!
//! for (key, value) in map.iter() {
//!     println!("{}: {}", key, *value);
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use lazyshard::{HashFunction, ShardMapBuilder};
//!
//! let map = ShardMapBuilder::new()
//!     .shard_count(32)?  // Must be power of two
//!     .capacity(4096)
//!     .seed(0x5eed)
//!     .hash_function(HashFunction::AHash)
//!     .build::<String, i32>();
//! assert_eq!(map.shard_count(), 32);
//! # Ok::<(), lazyshard::Error>(())
//! ```
//!
//! ## Concurrency contract
//!
//! - Single-key operations are atomic with respect to their shard.
//! - `len`, `clear`, `stats` and iteration visit shards one at a time and
//!   are not snapshots of the whole map.
//! - Accept callbacks and `range` visitors run while the shard lock is held
//!   and must not call back into the same map.

#![deny(missing_docs)]
#![warn(clippy::all)]

/// Configuration and builder types.
pub mod config;
/// Error types.
pub mod error;
/// Seeded hashing for shard assignment.
pub mod hash;
/// Iterator implementations.
pub mod iter;
mod shard;
/// Main ShardMap implementation.
pub mod shardmap;
/// Statistics and metrics collection.
pub mod stats;

pub use config::{Config, DefaultRouter, HashFunction, RoutingConfig, ShardMapBuilder, ShardRouter};
pub use error::{Error, Result};
pub use iter::Iter;
pub use shardmap::ShardMap;
pub use stats::{ShardOps, Stats};
