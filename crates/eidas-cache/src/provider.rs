//! Cache provider traits.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::CacheResult;

/// Cache provider trait for key-value caching.
///
/// Implementations must be thread-safe and support concurrent access.
/// All operations are async to support both local and distributed caches.
///
/// ## Type Parameters
///
/// Cache operations work with any type that implements `Serialize` + `DeserializeOwned`.
/// The cache implementation is responsible for serialization/deserialization.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Gets a value from the cache.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send;

    /// Sets a value in the cache with optional TTL.
    ///
    /// If `ttl` is `None`, the value will not expire automatically.
    async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()>
    where
        T: Serialize + Sync;

    /// Deletes a value from the cache.
    ///
    /// Returns `Ok(())` even if the key doesn't exist.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Checks if a live key exists in the cache.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Gets the remaining TTL for a key.
    ///
    /// Returns `None` if the key doesn't exist or has no TTL.
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// Clears all keys in the cache.
    async fn clear(&self) -> CacheResult<()>;
}

/// Atomic operations required for single-use semantics.
#[async_trait]
pub trait AtomicCacheProvider: CacheProvider {
    /// Sets a value only if the key doesn't exist.
    ///
    /// Returns `true` if the value was set, `false` if the key already existed.
    async fn set_nx<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<bool>
    where
        T: Serialize + Sync;

    /// Gets and deletes a value atomically.
    ///
    /// Of several concurrent callers for the same key at most one receives the value.
    async fn get_del<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send;
}
