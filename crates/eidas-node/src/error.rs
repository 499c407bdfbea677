//! HTTP error mapping.
//!
//! Every failure on a node endpoint is reported with its eIDAS error key so
//! the caller can map it to a localized message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use eidas_cache::CacheError;
use eidas_light::LightError;
use eidas_metadata::MetadataError;
use eidas_saml::SamlError;
use eidas_security::SecurityError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while serving a request.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The SAML message was rejected.
    #[error(transparent)]
    Saml(#[from] SamlError),

    /// The requester's metadata could not be obtained.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Handing the request to the specific side failed.
    #[error(transparent)]
    Light(#[from] LightError),

    /// The anti-abuse filter rejected the request.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// The cache backend failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The message id was already processed.
    #[error("message {0} was already processed")]
    Replayed(String),
}

impl NodeError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        let status = match self {
            Self::Saml(err) => err.http_status(),
            Self::Metadata(_) => 403,
            Self::Light(LightError::Validation(_)) | Self::Replayed(_) => 400,
            Self::Light(_) | Self::Cache(_) => 500,
            Self::Security(err) => err.http_status(),
        };
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Returns the eIDAS error key for this error.
    #[must_use]
    pub const fn error_key(&self) -> &'static str {
        match self {
            Self::Saml(err) => err.error_key(),
            Self::Metadata(err) => err.error_key(),
            Self::Security(err) => err.error_key(),
            Self::Replayed(_) => "COLLEAGUE_REQ_INVALID_SAML",
            Self::Light(_) | Self::Cache(_) => "INTERNAL_ERROR",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// eIDAS error key.
    pub error: String,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::info!(error = %self, key = self.error_key(), "request rejected");
        }
        let body = ErrorResponse {
            error: self.error_key().to_string(),
            error_description: Some(self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for node handlers.
pub type NodeResult<T> = Result<T, NodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_errors_keep_their_status() {
        let err = NodeError::from(SecurityError::RateLimited("192.0.2.1".into()));
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.error_key(), "REQUESTS_COLLEAGUE_REQUEST");

        let err = NodeError::from(SecurityError::MissingReferer);
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn metadata_and_replay_errors() {
        let err = NodeError::from(MetadataError::NoMetadata("https://sp.example.eu/metadata".into()));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.error_key(), "SAML_ENGINE_NO_METADATA");

        let err = NodeError::Replayed("_abc".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("_abc"));
    }

    #[test]
    fn saml_errors_use_engine_mapping() {
        let err = NodeError::from(SamlError::UnencryptedResponse);
        assert_eq!(err.error_key(), "SAML_ENGINE_UNENCRYPTED_RESPONSE");
    }
}
