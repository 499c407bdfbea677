//! Error handling for the eIDAS node.
//!
//! ## NIST 800-53 Rev5: SI-11 (Error Handling)
//!
//! Error messages are informative for operators while not exposing secrets
//! or key material to remote parties.

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// Attribute value could not be marshalled or unmarshalled.
    #[error("attribute value error: {0}")]
    AttributeValue(String),

    /// Resource not found.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// Internal error.
    #[error("internal error")]
    Internal,
}

impl Error {
    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Internal)
    }

    /// Returns whether this error represents invalid caller input.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::AttributeValue(_) | Self::NotFound(_) | Self::AlreadyExists(_)
        )
    }
}
