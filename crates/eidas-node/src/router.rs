//! Router configuration.
//!
//! This module creates the main Axum router that combines all endpoints.

use axum::{
    Router, middleware,
    routing::get,
};
use eidas_cache::AtomicCacheProvider;
use tower_http::trace::TraceLayer;

use crate::handlers::{colleague_request_post, colleague_request_redirect, health_check, metadata};
use crate::security::security_filter;
use crate::state::{AppState, COLLEAGUE_REQUEST_PATH, METADATA_PATH};

/// Creates the main application router.
///
/// Only the protocol endpoint sits behind the security filter.
pub fn create_router<C: AtomicCacheProvider + 'static>(state: AppState<C>) -> Router {
    let protocol = Router::new()
        .route(
            COLLEAGUE_REQUEST_PATH,
            get(colleague_request_redirect::<C>).post(colleague_request_post::<C>),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), security_filter::<C>));

    Router::new()
        .merge(protocol)
        .route(METADATA_PATH, get(metadata::<C>))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
