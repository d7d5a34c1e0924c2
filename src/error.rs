use thiserror::Error;

/// Result type for map configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when configuring a ShardMap.
///
/// Map operations themselves never fail: a missing key is reported as
/// `None`, not as an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The shard count is invalid (must be a power of two and greater than 0).
    #[error("shard count must be a power of two and greater than 0, got {count}")]
    InvalidShardCount {
        /// The rejected shard count.
        count: usize,
    },
}
