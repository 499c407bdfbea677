//! # eidas-cache
//!
//! Cache abstraction traits for the eIDAS node.
//!
//! Correlation data exchanged with the specific adapters (light requests and
//! responses) and replay-protection markers live in a cache with TTL eviction.
//! A single node uses [`MemoryCacheProvider`]; clustered deployments use the
//! Redis implementation from `eidas-cache-redis`.
//!
//! ## Cache Providers
//!
//! - [`CacheProvider`] - Basic key-value cache operations
//! - [`AtomicCacheProvider`] - Atomic operations (set-if-not-exists, get-and-delete)
//!
//! ## Specialized Caches
//!
//! - [`AntiReplayGuard`] - Single-use message identifiers
//!
//! ## Example
//!
//! ```ignore
//! use eidas_cache::{CacheProvider, CacheResult};
//! use std::time::Duration;
//!
//! async fn store(cache: &impl CacheProvider, id: &str, xml: &str) -> CacheResult<()> {
//!     cache.set(&format!("lightRequest:{id}"), &xml, Some(Duration::from_secs(120))).await
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod error;
pub mod memory;
pub mod provider;
pub mod replay;

pub use error::{CacheError, CacheResult};
pub use memory::MemoryCacheProvider;
pub use provider::{AtomicCacheProvider, CacheProvider};
pub use replay::AntiReplayGuard;
