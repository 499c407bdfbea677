//! Read-through metadata cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::{FetcherSettings, MetadataFetcher, StaticMetadataSource};
use crate::error::{MetadataError, MetadataResult};
use crate::params::EidasMetadataParameters;

/// Caches metadata by URL until its `validUntil`.
///
/// Provisioned metadata from a [`StaticMetadataSource`] takes precedence
/// over the network. Cached entries are never served past their validity:
/// an expired entry is evicted and fetched again on the same access.
#[derive(Debug)]
pub struct CachingMetadataFetcher<F> {
    inner: F,
    settings: FetcherSettings,
    static_source: Option<StaticMetadataSource>,
    cache: DashMap<String, EidasMetadataParameters>,
}

impl<F: MetadataFetcher> CachingMetadataFetcher<F> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: F, settings: FetcherSettings) -> Self {
        Self {
            inner,
            settings,
            static_source: None,
            cache: DashMap::new(),
        }
    }

    /// Serves provisioned metadata before going to the network.
    #[must_use]
    pub fn with_static_source(mut self, source: StaticMetadataSource) -> Self {
        self.static_source = Some(source);
        self
    }

    /// Returns the wrapped fetcher.
    #[must_use]
    pub const fn inner(&self) -> &F {
        &self.inner
    }

    /// Returns the metadata for `url`, evaluating validity at `now`.
    pub async fn get_metadata_at(&self, url: &str, now: DateTime<Utc>) -> MetadataResult<EidasMetadataParameters> {
        if let Some(params) = self.static_source.as_ref().and_then(|s| s.lookup(url)) {
            if params.is_valid_at(now) {
                return Ok(params.clone());
            }
            warn!(url = %url, "provisioned metadata is expired");
        }

        let mut cached = self.cached(url);
        if cached.as_ref().is_some_and(|params| !params.is_valid_at(now)) {
            info!(url = %url, "cached metadata expired, evicting");
            self.evict(url);
            cached = None;
        }

        if cached.is_none() || self.settings.http_retrieval {
            if let Err(e) = self.settings.validate_url(url) {
                debug!(url = %url, error = %e, "metadata URL not allowed");
                return cached.ok_or_else(|| MetadataError::NoMetadata(url.to_string()));
            }
            let fetched = self.inner.get_metadata(url).await?;
            if !fetched.is_valid_at(now) {
                warn!(url = %url, valid_until = ?fetched.valid_until, "fetched metadata is expired");
                return Err(MetadataError::Expired(url.to_string()));
            }
            self.cache.insert(url.to_string(), fetched.clone());
            debug!(url = %url, "metadata cached");
            return Ok(fetched);
        }

        cached.ok_or_else(|| MetadataError::NoMetadata(url.to_string()))
    }

    /// Returns the cached entry for `url`, valid or not.
    #[must_use]
    pub fn cached(&self, url: &str) -> Option<EidasMetadataParameters> {
        self.cache.get(url).map(|entry| entry.value().clone())
    }

    /// Removes the entry for `url`.
    pub fn evict(&self, url: &str) {
        self.cache.remove(url);
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let count = self.cache.len();
        self.cache.clear();
        info!(count, "metadata cache cleared");
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[async_trait]
impl<F: MetadataFetcher> MetadataFetcher for CachingMetadataFetcher<F> {
    async fn get_metadata(&self, url: &str) -> MetadataResult<EidasMetadataParameters> {
        self.get_metadata_at(url, Utc::now()).await
    }
}
