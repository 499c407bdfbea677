//! # eidas-node
//!
//! HTTP front end of an eIDAS proxy service node.
//!
//! This crate wires the protocol crates together:
//! - `GET /metadata` - signed SAML metadata of the node
//! - `GET|POST /ColleagueRequest` - AuthnRequests from connectors, behind the
//!   security filter, handed to the specific side as light requests
//! - `GET /health` - health check
//!
//! ## Architecture
//!
//! The state is generic over the correlation cache so the same router runs
//! on the in-memory cache for a single instance and on Redis when several
//! instances share state.
//!
//! ## Usage
//!
//! ```ignore
//! use eidas_node::Node;
//!
//! let config = eidas_core::NodeConfig::from_env()?;
//! Node::new(config).run().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod credentials;
pub mod error;
pub mod handlers;
pub mod router;
pub mod security;
pub mod state;

pub use credentials::NodeCredentials;
pub use error::{NodeError, NodeResult};
pub use router::create_router;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use eidas_cache::{AtomicCacheProvider, MemoryCacheProvider};
use eidas_cache_redis::{RedisCacheProvider, RedisConfig};
use eidas_core::NodeConfig;
use eidas_security::SecurityRequestFilter;
use tokio::net::TcpListener;

/// Lower bound of the purge interval.
const MIN_PURGE_INTERVAL: Duration = Duration::from_secs(10);

/// The eIDAS node server.
pub struct Node {
    config: NodeConfig,
}

impl Node {
    /// Creates a new server instance.
    #[must_use]
    pub const fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Runs the server.
    ///
    /// This starts the HTTP server and blocks until it receives a shutdown signal.
    pub async fn run(self) -> anyhow::Result<()> {
        let credentials = NodeCredentials::load(&self.config.saml)?;
        let metadata = state::http_metadata_fetcher(&self.config)?;
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port).parse()?;

        match self.config.cache.redis_url.clone() {
            Some(url) => {
                let redis = RedisConfig::from_url(url).key_prefix(&self.config.cache.key_prefix);
                let cache = Arc::new(RedisCacheProvider::new(redis).await?);
                let state = AppState::new(self.config, &credentials, cache, metadata)?;
                serve(addr, state).await
            }
            None => {
                tracing::info!("using the in-memory correlation cache");
                let cache = Arc::new(MemoryCacheProvider::new());
                spawn_cache_purge(Arc::clone(&cache));
                let state = AppState::new(self.config, &credentials, cache, metadata)?;
                serve(addr, state).await
            }
        }
    }
}

async fn serve<C: AtomicCacheProvider + 'static>(addr: SocketAddr, state: AppState<C>) -> anyhow::Result<()> {
    let window = state
        .config
        .security
        .ip_max_time_secs
        .max(state.config.security.sp_max_time_secs);
    spawn_limiter_purge(Arc::clone(&state.security), window);

    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Periodically drops limiter entries that fell out of their window.
fn spawn_limiter_purge(filter: Arc<SecurityRequestFilter>, window_secs: i64) {
    let period = Duration::from_secs(u64::try_from(window_secs).unwrap_or(0)).max(MIN_PURGE_INTERVAL);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            filter.purge(Utc::now());
        }
    });
}

/// Periodically drops expired in-memory cache entries.
fn spawn_cache_purge(cache: Arc<MemoryCacheProvider>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            cache.purge_expired();
        }
    });
}

/// Waits for a shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
