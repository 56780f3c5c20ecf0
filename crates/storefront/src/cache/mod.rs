//! Local key-value cache.
//!
//! A small persistent string store used for last-known-good snapshots (the
//! per-user cart mirror) and the persisted sign-in session. Nothing stored
//! here is authoritative; callers treat every failure as a cache miss.

mod file;
mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when reading or writing the local cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem operation failed.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key is empty.
    #[error("invalid cache key: {0:?}")]
    InvalidKey(String),

    /// Cache backend is not available.
    #[error("cache unavailable")]
    Unavailable,
}

/// Persistent string key-value store.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Read a value; `Ok(None)` when the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_cache_is_object_safe() {
        fn _accepts_dyn(_cache: &dyn LocalCache) {}
    }
}
