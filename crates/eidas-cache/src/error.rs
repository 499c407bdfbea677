//! Cache error types.

use std::fmt;

/// Cache operation errors.
#[derive(Debug)]
pub enum CacheError {
    /// Connection to the cache backend failed.
    Connection(String),
    /// Value could not be serialized or deserialized.
    Serialization(String),
    /// Key not found when the operation requires it.
    NotFound,
    /// Correlation value was already consumed, expired or never stored.
    Missing(String),
    /// Invalid cache configuration.
    Configuration(String),
    /// Internal cache error.
    Internal(String),
}

impl CacheError {
    /// Returns whether retrying the operation may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "cache connection error: {msg}"),
            Self::Serialization(msg) => write!(f, "cache serialization error: {msg}"),
            Self::NotFound => write!(f, "key not found in cache"),
            Self::Missing(key) => write!(f, "no cached value for {key}"),
            Self::Configuration(msg) => write!(f, "cache configuration error: {msg}"),
            Self::Internal(msg) => write!(f, "internal cache error: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
