//! Metadata retrieval.
//!
//! [`HttpMetadataFetcher`] downloads and verifies remote metadata,
//! [`CachingMetadataFetcher`] keeps the result until its `validUntil` and
//! [`StaticMetadataSource`] serves metadata provisioned with the node.

mod caching;
mod http;
mod static_source;

pub use caching::CachingMetadataFetcher;
pub use http::HttpMetadataFetcher;
pub use static_source::StaticMetadataSource;

use std::time::Duration;

use async_trait::async_trait;
use eidas_core::config::MetadataConfig;
use tracing::{debug, warn};
use url::Url;

use crate::error::{MetadataError, MetadataResult};
use crate::params::EidasMetadataParameters;
use crate::whitelist::MetadataWhitelist;

/// TLS protocol used when none is configured.
pub const DEFAULT_TLS_PROTOCOL: &str = "TLSv1.2";

/// Source of peer metadata, keyed by metadata URL.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Returns the metadata published at `url`.
    async fn get_metadata(&self, url: &str) -> MetadataResult<EidasMetadataParameters>;
}

/// Retrieval policy shared by the fetchers.
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    /// Allowed metadata URLs.
    pub whitelist: MetadataWhitelist,
    /// Whether [`Self::whitelist`] is enforced.
    pub whitelist_enabled: bool,
    /// Whether plain `http` URLs are accepted.
    pub allow_http: bool,
    /// Whether document signatures are validated.
    pub validate_signature: bool,
    /// Whether every access goes to the network, bypassing the cache.
    pub http_retrieval: bool,
    /// HTTP timeout.
    pub timeout: Duration,
    /// Enabled TLS protocol names, e.g. `TLSv1.2`.
    pub tls_protocols: Vec<String>,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self::from_config(&MetadataConfig::default())
    }
}

impl FetcherSettings {
    /// Builds the settings from the node configuration.
    #[must_use]
    pub fn from_config(config: &MetadataConfig) -> Self {
        Self {
            whitelist: MetadataWhitelist::parse(&config.whitelist),
            whitelist_enabled: config.whitelist_enabled,
            allow_http: config.allow_http,
            validate_signature: config.validate_signature,
            http_retrieval: config.http_retrieval,
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            tls_protocols: parse_tls_protocols(&config.tls_enabled_protocols),
        }
    }

    /// Accepts plain `http` URLs.
    #[must_use]
    pub const fn with_http_allowed(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Enforces `whitelist`.
    #[must_use]
    pub fn with_whitelist(mut self, whitelist: MetadataWhitelist) -> Self {
        self.whitelist = whitelist;
        self.whitelist_enabled = true;
        self
    }

    /// Enables or disables signature validation.
    #[must_use]
    pub const fn with_signature_validation(mut self, validate: bool) -> Self {
        self.validate_signature = validate;
        self
    }

    /// Makes every access go to the network.
    #[must_use]
    pub const fn with_http_retrieval(mut self, always: bool) -> Self {
        self.http_retrieval = always;
        self
    }

    /// Checks `url` before any retrieval: syntax, scheme and whitelist.
    pub fn validate_url(&self, url: &str) -> MetadataResult<()> {
        if url.trim().is_empty() || Url::parse(url).is_err() {
            warn!(url = %url, "rejected metadata URL with invalid format");
            return Err(MetadataError::InvalidSource("Metadata URL format is invalid".to_string()));
        }
        if !self.is_allowed_scheme(url) {
            warn!(url = %url, "rejected insecure metadata URL");
            return Err(MetadataError::InvalidSource(format!(
                "Metadata URL is not secure: \"{url}\""
            )));
        }
        if self.whitelist_enabled && !self.whitelist.is_whitelisted(url) {
            warn!(url = %url, "rejected metadata URL outside the whitelist");
            return Err(MetadataError::InvalidSource(format!(
                "Metadata URL is not whitelisted: \"{url}\""
            )));
        }
        Ok(())
    }

    fn is_allowed_scheme(&self, url: &str) -> bool {
        let lower = url.to_ascii_lowercase();
        lower.starts_with("https://") || (self.allow_http && lower.starts_with("http://"))
    }
}

/// Splits a `,` or `;` separated protocol list, defaulting to
/// [`DEFAULT_TLS_PROTOCOL`].
#[must_use]
pub fn parse_tls_protocols(value: &str) -> Vec<String> {
    let protocols: Vec<String> = value
        .split([',', ';'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if protocols.is_empty() {
        debug!("no TLS protocols configured, using {DEFAULT_TLS_PROTOCOL}");
        return vec![DEFAULT_TLS_PROTOCOL.to_string()];
    }
    protocols
}
