//! Metadata error types.

use eidas_saml::SamlError;
use thiserror::Error;

/// Metadata retrieval and processing errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// No metadata could be obtained for the URL.
    #[error("no metadata available for {0}")]
    NoMetadata(String),

    /// The metadata URL was rejected before retrieval.
    #[error("{0}")]
    InvalidSource(String),

    /// HTTP retrieval failed.
    #[error("metadata retrieval failed: {0}")]
    Fetch(String),

    /// The document is not a usable entity descriptor.
    #[error("invalid metadata: {0}")]
    Invalid(String),

    /// The document's `validUntil` lies in the past.
    #[error("metadata for {0} is expired")]
    Expired(String),

    /// The document signature did not validate.
    #[error("metadata signature invalid: {0}")]
    Signature(String),

    /// XML or signing failure in the SAML layer.
    #[error(transparent)]
    Saml(#[from] SamlError),
}

impl MetadataError {
    /// Returns the eIDAS error key reported to the peer.
    #[must_use]
    pub const fn error_key(&self) -> &'static str {
        match self {
            Self::NoMetadata(_) | Self::InvalidSource(_) | Self::Fetch(_) => "SAML_ENGINE_NO_METADATA",
            Self::Invalid(_) | Self::Expired(_) | Self::Signature(_) | Self::Saml(_) => {
                "SAML_ENGINE_INVALID_METADATA"
            }
        }
    }
}

impl From<reqwest::Error> for MetadataError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_keys() {
        assert_eq!(
            MetadataError::NoMetadata("https://x".into()).error_key(),
            "SAML_ENGINE_NO_METADATA"
        );
        assert_eq!(
            MetadataError::Expired("https://x".into()).error_key(),
            "SAML_ENGINE_INVALID_METADATA"
        );
    }

    #[test]
    fn source_errors_display_verbatim() {
        let err = MetadataError::InvalidSource("Metadata URL format is invalid".into());
        assert_eq!(err.to_string(), "Metadata URL format is invalid");
    }
}
