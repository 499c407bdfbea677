//! # eidas-cache-redis
//!
//! Redis cache implementation for the eIDAS node.
//!
//! This crate provides Redis-based caching using the `fred` crate,
//! implementing the cache traits defined in `eidas-cache`. It lets several
//! node instances share light request/response correlation data and
//! replay-protection markers.
//!
//! ## Features
//!
//! - Automatic reconnection with exponential backoff
//! - TLS support
//! - Key prefixing so that several nodes can share one database
//!
//! ## Example
//!
//! ```ignore
//! use eidas_cache_redis::{RedisCacheProvider, RedisConfig};
//! use eidas_cache::AtomicCacheProvider;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = RedisCacheProvider::new(RedisConfig::from_url("redis://localhost:6379/0")).await?;
//!
//!     cache.set_nx("antiReplay:_abc", &true, Some(Duration::from_secs(300))).await?;
//!     let token: Option<String> = cache.get_del("lightRequest:_abc").await?;
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod provider;

pub use config::RedisConfig;
pub use provider::RedisCacheProvider;
