//! Replay protection for SAML message identifiers.
//!
//! A message ID is recorded the first time it is seen. Any later
//! occurrence within the retention window is a replay.

use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheResult;
use crate::provider::AtomicCacheProvider;

const KEY_PREFIX: &str = "antiReplay";

/// Tracks message identifiers that have already been processed.
#[derive(Debug)]
pub struct AntiReplayGuard<C> {
    cache: Arc<C>,
    retention: Duration,
}

impl<C: AtomicCacheProvider> AntiReplayGuard<C> {
    /// Creates a guard that remembers identifiers for `retention`.
    #[must_use]
    pub const fn new(cache: Arc<C>, retention: Duration) -> Self {
        Self { cache, retention }
    }

    /// Records `message_id` and returns `true` if it had not been seen before.
    pub async fn check_and_record(&self, message_id: &str) -> CacheResult<bool> {
        let key = format!("{KEY_PREFIX}:{message_id}");
        let fresh = self
            .cache
            .set_nx(&key, &true, Some(self.retention))
            .await?;
        if !fresh {
            tracing::warn!(message_id, "replayed message identifier");
        }
        Ok(fresh)
    }

    /// Returns the retention window.
    #[must_use]
    pub const fn retention(&self) -> Duration {
        self.retention
    }
}

impl<C> Clone for AntiReplayGuard<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            retention: self.retention,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCacheProvider;

    #[tokio::test]
    async fn second_occurrence_is_a_replay() {
        let guard = AntiReplayGuard::new(
            Arc::new(MemoryCacheProvider::new()),
            Duration::from_secs(300),
        );
        assert!(guard.check_and_record("_abc").await.unwrap());
        assert!(!guard.check_and_record("_abc").await.unwrap());
        assert!(guard.check_and_record("_def").await.unwrap());
    }

    #[tokio::test]
    async fn identifier_is_forgotten_after_retention() {
        let guard = AntiReplayGuard::new(
            Arc::new(MemoryCacheProvider::new()),
            Duration::from_millis(10),
        );
        assert!(guard.check_and_record("_abc").await.unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(guard.check_and_record("_abc").await.unwrap());
    }
}
