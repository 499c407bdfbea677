//! # eIDAS node
//!
//! Main entry point for the eIDAS proxy service node.

#![forbid(unsafe_code)]
#![deny(warnings)]

use eidas_core::NodeConfig;
use eidas_node::Node;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = NodeConfig::from_env()?;
    tracing::info!(
        country = %config.saml.country,
        base_url = %config.server.base_url,
        "eIDAS node starting"
    );

    Node::new(config).run().await
}
