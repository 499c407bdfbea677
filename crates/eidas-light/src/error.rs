//! Light exchange error types.

use eidas_cache::CacheError;
use thiserror::Error;

/// Token codec errors.
///
/// The messages are part of the interface with the specific adapters and
/// must not change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LightTokenError {
    /// The digest does not match the token contents.
    #[error("LightToken digest failure")]
    Digest,

    /// The encoded token is larger than the allowed size.
    #[error("Error parsing LightToken, size exceeds {0}")]
    SizeExceeded(usize),

    /// The token is not made of four non-blank parts.
    #[error("LightToken parse error")]
    Parse,

    /// The creation timestamp could not be parsed.
    #[error("LightToken createdOn timestamp parse failure")]
    CreatedOn,

    /// The issuer is blank.
    #[error("issuer cannot be null, empty or blank")]
    BlankIssuer,

    /// The shared secret is blank.
    #[error("secret cannot be null, empty or blank")]
    BlankSecret,

    /// The configured digest algorithm is not available.
    #[error("{0} MessageDigest not available")]
    InvalidAlgorithm(String),
}

/// Errors of the specific communication exchange.
#[derive(Debug, Error)]
pub enum LightError {
    /// Token encoding or verification failed.
    #[error(transparent)]
    Token(#[from] LightTokenError),

    /// A light message is missing a mandatory field or is inconsistent.
    #[error("invalid light message: {0}")]
    Validation(String),

    /// A light message could not be serialized or parsed.
    #[error("light message XML error: {0}")]
    Xml(String),

    /// An attribute could not be resolved or converted.
    #[error("attribute error: {0}")]
    Attribute(#[from] eidas_core::Error),

    /// The correlation cache failed.
    #[error("correlation cache error: {0}")]
    Cache(#[from] CacheError),

    /// No message is stored for the token (already consumed or expired).
    #[error("no light message found for token {0}")]
    Missing(String),
}

/// Result type for light exchange operations.
pub type LightResult<T> = Result<T, LightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_error_messages() {
        assert_eq!(LightTokenError::Digest.to_string(), "LightToken digest failure");
        assert_eq!(
            LightTokenError::SizeExceeded(1024).to_string(),
            "Error parsing LightToken, size exceeds 1024"
        );
        assert_eq!(
            LightTokenError::InvalidAlgorithm("invalidAlgorithm".into()).to_string(),
            "invalidAlgorithm MessageDigest not available"
        );
    }

    #[test]
    fn token_error_is_transparent() {
        let err = LightError::from(LightTokenError::Parse);
        assert_eq!(err.to_string(), "LightToken parse error");
    }
}
