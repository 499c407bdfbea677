//! In-memory cache provider.
//!
//! Values are stored as JSON strings so that the in-memory and Redis
//! providers observe the same serialization rules. Expired entries are
//! invisible to readers and removed lazily, or eagerly by
//! [`MemoryCacheProvider::purge_expired`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::CacheResult;
use crate::provider::{AtomicCacheProvider, CacheProvider};

#[derive(Debug, Clone)]
struct CachedValue {
    json: String,
    expires_at: Option<Instant>,
}

impl CachedValue {
    fn new(json: String, ttl: Option<Duration>) -> Self {
        Self {
            json,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Thread-safe in-memory cache with per-entry TTL.
#[derive(Debug, Default)]
pub struct MemoryCacheProvider {
    entries: DashMap<String, CachedValue>,
}

impl MemoryCacheProvider {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, value| !value.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "purged expired cache entries");
        }
        removed
    }

    /// Returns the number of stored entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_json(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(value) if !value.is_expired(now) => return Some(value.json.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, value| value.is_expired(now));
        }
        None
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.live_json(key) {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        let json = serde_json::to_string(value)?;
        self.entries
            .insert(key.to_string(), CachedValue::new(json, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.live_json(key).is_some())
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let now = Instant::now();
        Ok(self.entries.get(key).and_then(|value| {
            value
                .expires_at
                .filter(|at| *at > now)
                .map(|at| at.duration_since(now))
        }))
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.clear();
        Ok(())
    }
}

#[async_trait]
impl AtomicCacheProvider for MemoryCacheProvider {
    async fn set_nx<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<bool>
    where
        T: Serialize + Sync,
    {
        let json = serde_json::to_string(value)?;
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(CachedValue::new(json, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CachedValue::new(json, ttl));
                Ok(true)
            }
        }
    }

    async fn get_del<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let now = Instant::now();
        match self.entries.remove(key) {
            Some((_, value)) if !value.is_expired(now) => {
                Ok(Some(serde_json::from_str(&value.json)?))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let cache = MemoryCacheProvider::new();
        cache.set("a", &"value".to_string(), None).await.unwrap();

        let value: Option<String> = cache.get("a").await.unwrap();
        assert_eq!(value.as_deref(), Some("value"));
        assert!(cache.exists("a").await.unwrap());
        assert_eq!(cache.ttl("a").await.unwrap(), None);

        cache.delete("a").await.unwrap();
        assert!(!cache.exists("a").await.unwrap());
        cache.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn expired_entries_are_invisible() {
        let cache = MemoryCacheProvider::new();
        cache
            .set("short", &1u32, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        cache
            .set("long", &2u32, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(cache.ttl("long").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(50)).await;

        let short: Option<u32> = cache.get("short").await.unwrap();
        assert_eq!(short, None);
        let long: Option<u32> = cache.get("long").await.unwrap();
        assert_eq!(long, Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let cache = MemoryCacheProvider::new();
        cache
            .set("x", &"x", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        cache.set("y", &"y", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn set_nx_only_once() {
        let cache = MemoryCacheProvider::new();
        assert!(cache.set_nx("id", &true, None).await.unwrap());
        assert!(!cache.set_nx("id", &true, None).await.unwrap());
    }

    #[tokio::test]
    async fn set_nx_replaces_expired_value() {
        let cache = MemoryCacheProvider::new();
        assert!(
            cache
                .set_nx("id", &1u8, Some(Duration::from_millis(10)))
                .await
                .unwrap()
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.set_nx("id", &2u8, None).await.unwrap());
    }

    #[tokio::test]
    async fn get_del_is_single_use() {
        let cache = MemoryCacheProvider::new();
        cache.set("k", &"payload", None).await.unwrap();

        let first: Option<String> = cache.get_del("k").await.unwrap();
        let second: Option<String> = cache.get_del("k").await.unwrap();
        assert_eq!(first.as_deref(), Some("payload"));
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let cache = MemoryCacheProvider::new();
        cache.set("a", &1, None).await.unwrap();
        cache.set("b", &2, None).await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.is_empty());
    }
}
