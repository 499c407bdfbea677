//! Sliding-window request limiter.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::error::{SecurityError, SecurityResult};

/// Remembers request timestamps per key and rejects a request when the
/// window already holds `threshold` of them.
///
/// Updates for one key happen under its map shard lock, so concurrent
/// requests from the same address are counted exactly.
#[derive(Debug, Default)]
pub struct SlidingWindowLimiter {
    windows: DashMap<String, Vec<DateTime<Utc>>>,
}

impl SlidingWindowLimiter {
    /// Creates an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request for `key` at `now`.
    ///
    /// Timestamps older than `max_time_secs` are discarded first. The
    /// request is rejected when the remaining count plus this request
    /// exceeds `threshold`; rejected requests are not recorded.
    pub fn check(&self, key: &str, max_time_secs: i64, threshold: i64, now: DateTime<Utc>) -> SecurityResult<()> {
        match self.windows.entry(key.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(vec![now]);
                Ok(())
            }
            Entry::Occupied(mut entry) => {
                let limit = now - Duration::seconds(max_time_secs);
                let timestamps = entry.get_mut();
                timestamps.retain(|t| *t >= limit);

                let threshold = usize::try_from(threshold).unwrap_or(0);
                if timestamps.len() + 1 > threshold {
                    warn!(key = %key, threshold, "request limit reached");
                    return Err(SecurityError::RateLimited(key.to_string()));
                }
                timestamps.push(now);
                Ok(())
            }
        }
    }

    /// Drops keys whose timestamps all fell out of the window.
    pub fn purge(&self, max_time_secs: i64, now: DateTime<Utc>) {
        let limit = now - Duration::seconds(max_time_secs);
        let before = self.windows.len();
        self.windows.retain(|_, timestamps| timestamps.iter().any(|t| *t >= limit));
        debug!(removed = before - self.windows.len(), "limiter purged");
    }

    /// Returns the number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Returns whether no key is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const ADDR: &str = "192.0.2.10";

    #[test]
    fn threshold_plus_one_is_rejected() {
        let limiter = SlidingWindowLimiter::new();
        let now = Utc::now();
        for i in 0..3 {
            limiter.check(ADDR, 60, 3, now + Duration::seconds(i)).unwrap();
        }
        let err = limiter.check(ADDR, 60, 3, now + Duration::seconds(3)).unwrap_err();
        assert!(matches!(err, SecurityError::RateLimited(_)));
    }

    #[test]
    fn window_elapsed_is_fresh() {
        let limiter = SlidingWindowLimiter::new();
        let now = Utc::now();
        for _ in 0..3 {
            limiter.check(ADDR, 60, 3, now).unwrap();
        }
        assert!(limiter.check(ADDR, 60, 3, now + Duration::seconds(60)).is_err());
        for _ in 0..3 {
            limiter.check(ADDR, 60, 3, now + Duration::seconds(61)).unwrap();
        }
    }

    #[test]
    fn keys_are_independent() {
        let limiter = SlidingWindowLimiter::new();
        let now = Utc::now();
        limiter.check("a", 60, 1, now).unwrap();
        assert!(limiter.check("a", 60, 1, now).is_err());
        limiter.check("b", 60, 1, now).unwrap();
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn purge_drops_idle_keys() {
        let limiter = SlidingWindowLimiter::new();
        let now = Utc::now();
        limiter.check("idle", 60, 5, now - Duration::seconds(120)).unwrap();
        limiter.check("busy", 60, 5, now).unwrap();
        limiter.purge(60, now);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn concurrent_requests_are_counted_exactly() {
        let limiter = Arc::new(SlidingWindowLimiter::new());
        let now = Utc::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| limiter.check(ADDR, 60, 100, now).is_ok())
                        .count()
                })
            })
            .collect();
        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, 100);
    }
}
