//! Redis cache provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use eidas_cache::{AtomicCacheProvider, CacheError, CacheProvider, CacheResult};
use fred::prelude::*;
use fred::types::scan::Scanner;
use futures::TryStreamExt;
use serde::{Serialize, de::DeserializeOwned};

use crate::config::RedisConfig;
use crate::error::from_redis_error;

/// Redis-based cache provider.
pub struct RedisCacheProvider {
    client: Client,
    config: RedisConfig,
}

impl RedisCacheProvider {
    /// Creates a new Redis cache provider.
    ///
    /// ## Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn new(config: RedisConfig) -> CacheResult<Self> {
        let redis_config = Config::from_url(&config.connection_url())
            .map_err(|e| CacheError::Configuration(e.to_string()))?;

        let client = Client::new(
            redis_config,
            None,
            None,
            Some(ReconnectPolicy::new_exponential(0, 1000, 30_000, 2)),
        );

        client.init().await.map_err(from_redis_error)?;
        tracing::info!(prefix = %config.key_prefix, "connected to redis cache");

        Ok(Self { client, config })
    }

    /// Returns the underlying Redis client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Formats a key with the configured prefix.
    fn key(&self, key: &str) -> String {
        self.config.prefixed_key(key)
    }

    /// Collects keys from a scan pattern.
    async fn scan_keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut scanner = self.client.scan(pattern, None, None);
        let mut keys = Vec::new();

        while let Some(result) = scanner.try_next().await.map_err(from_redis_error)? {
            if let Some(page) = result.results() {
                for value in page {
                    if let Some(s) = value.as_str() {
                        keys.push(s.to_string());
                    }
                }
            }
        }

        Ok(keys)
    }
}

/// Converts a TTL to whole seconds for Redis expiration, rounding up to one.
#[allow(clippy::cast_possible_wrap)]
const fn expiration(ttl: Duration) -> Expiration {
    let secs = if ttl.as_secs() == 0 { 1 } else { ttl.as_secs() };
    Expiration::EX(secs as i64)
}

fn decode<T: DeserializeOwned>(value: Option<String>) -> CacheResult<Option<T>> {
    match value {
        Some(v) => Ok(Some(serde_json::from_str(&v)?)),
        None => Ok(None),
    }
}

#[async_trait]
impl CacheProvider for RedisCacheProvider {
    async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let key = self.key(key);
        let value: Option<String> = self.client.get(&key).await.map_err(from_redis_error)?;
        decode(value)
    }

    async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        let key = self.key(key);
        let serialized = serde_json::to_string(value)?;
        self.client
            .set::<(), _, _>(&key, serialized, ttl.map(expiration), None, false)
            .await
            .map_err(from_redis_error)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let key = self.key(key);
        self.client
            .del::<(), _>(&key)
            .await
            .map_err(from_redis_error)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let key = self.key(key);
        let count: i64 = self.client.exists(&key).await.map_err(from_redis_error)?;
        Ok(count > 0)
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let key = self.key(key);
        let ttl: i64 = self.client.ttl(&key).await.map_err(from_redis_error)?;
        Ok(u64::try_from(ttl).ok().map(Duration::from_secs))
    }

    /// Removes every key under the configured prefix.
    async fn clear(&self) -> CacheResult<()> {
        let keys = self.scan_keys(&self.key("*")).await?;
        if keys.is_empty() {
            return Ok(());
        }
        tracing::debug!(count = keys.len(), "clearing redis cache keys");
        self.client
            .del::<(), _>(keys)
            .await
            .map_err(from_redis_error)
    }
}

#[async_trait]
impl AtomicCacheProvider for RedisCacheProvider {
    async fn set_nx<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<bool>
    where
        T: Serialize + Sync,
    {
        let key = self.key(key);
        let serialized = serde_json::to_string(value)?;

        let result: Option<String> = self
            .client
            .set(&key, serialized, ttl.map(expiration), Some(SetOptions::NX), false)
            .await
            .map_err(from_redis_error)?;

        Ok(result.is_some())
    }

    async fn get_del<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let key = self.key(key);
        let value: Option<String> = self.client.getdel(&key).await.map_err(from_redis_error)?;
        decode(value)
    }
}
