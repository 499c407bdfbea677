//! Security filter middleware.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header::REFERER,
    middleware::Next,
    response::{IntoResponse, Response},
};
use eidas_cache::AtomicCacheProvider;
use eidas_security::SecurityRequest;

use crate::error::NodeError;
use crate::state::AppState;

/// Query parameter naming the SP the request is submitted for.
pub const SP_URL_PARAM: &str = "spUrl";

/// Runs the trusted domain and rate checks before the protocol handlers.
pub async fn security_filter<C: AtomicCacheProvider + 'static>(
    State(state): State<AppState<C>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let remote_addr = remote_addr(&request);
    let referer = request
        .headers()
        .get(REFERER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let sp_url = request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == SP_URL_PARAM)
            .map(|(_, value)| value.into_owned())
    });

    let mut checked = SecurityRequest::new(&path, &remote_addr);
    if let Some(referer) = referer.as_deref() {
        checked = checked.with_referer(referer);
    }
    if let Some(sp_url) = sp_url.as_deref() {
        checked = checked.with_sp_url(sp_url);
    }
    if let Err(err) = state.security.check(&checked) {
        return NodeError::from(err).into_response();
    }
    next.run(request).await
}

/// Client address: the connection peer, else the first `X-Forwarded-For`
/// entry.
fn remote_addr(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
