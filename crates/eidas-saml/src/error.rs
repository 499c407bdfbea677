//! SAML engine error types.
//!
//! Every error maps to a SAML status code pair, an HTTP status and the
//! eIDAS error key reported to the counterpart node.

use thiserror::Error;

use crate::types::{status_codes, sub_status_codes};

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Invalid SAML request format or content.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid SAML response format or content.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Missing required element or attribute.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// XML signature validation failed.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// XML signature creation failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// Signature algorithm is not in the whitelist.
    #[error("signature algorithm not allowed: {0}")]
    SignatureAlgorithmNotAllowed(String),

    /// Signing certificate is not one of the trusted certificates.
    #[error("untrusted certificate: {0}")]
    UntrustedCertificate(String),

    /// Certificate rejected by the validity or self-signed policy, or no
    /// usable credential is configured.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Response carries plain assertions where encryption is required, or
    /// no recipient certificate is available.
    #[error("response is not encrypted")]
    UnencryptedResponse,

    /// Data encryption algorithm is not in the whitelist.
    #[error("encryption algorithm not allowed: {0}")]
    EncryptionAlgorithmNotAllowed(String),

    /// Assertion encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Assertion decryption failed.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Level of assurance rule violated; holds the rule key.
    #[error("invalid level of assurance: {0}")]
    InvalidLoa(String),

    /// Assertion expired.
    #[error("assertion expired")]
    AssertionExpired,

    /// Assertion not yet valid.
    #[error("assertion not yet valid")]
    AssertionNotYetValid,

    /// Issue instant outside the accepted window.
    #[error("invalid issue instant: {0}")]
    InvalidIssueInstant(String),

    /// Invalid audience.
    #[error("invalid audience: expected {expected}, got {actual}")]
    InvalidAudience {
        /// The expected audience URI.
        expected: String,
        /// The actual audience URI.
        actual: String,
    },

    /// Invalid destination.
    #[error("invalid destination: expected {expected}, got {actual}")]
    InvalidDestination {
        /// The expected destination URL.
        expected: String,
        /// The actual destination URL.
        actual: String,
    },

    /// `InResponseTo` does not match the stored request.
    #[error("InResponseTo mismatch: expected {expected}, got {actual}")]
    InResponseToMismatch {
        /// The stored request id.
        expected: String,
        /// The value found in the message.
        actual: String,
    },

    /// Bearer subject confirmation is missing or invalid.
    #[error("invalid subject confirmation: {0}")]
    InvalidSubjectConfirmation(String),

    /// Neither the request nor the requester metadata declares an SP type.
    #[error("SPType not provided")]
    MissingSpType,

    /// Both the request and the requester metadata declare an SP type.
    #[error("SPType both in requester metadata and request")]
    InconsistentSpType,

    /// Assertion consumer service URL does not match the metadata.
    #[error("invalid assertion consumer service URL: {0}")]
    InvalidAcsUrl(String),

    /// Unknown or unsupported binding.
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// Attribute definition or value error.
    #[error("attribute error: {0}")]
    Attribute(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Deflate decompression error.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// Cryptographic operation error.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SamlError {
    /// Returns the SAML status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidResponse(_)
            | Self::XmlParse(_)
            | Self::MissingElement(_)
            | Self::SignatureInvalid(_)
            | Self::SignatureAlgorithmNotAllowed(_)
            | Self::UntrustedCertificate(_)
            | Self::InvalidLoa(_)
            | Self::AssertionExpired
            | Self::AssertionNotYetValid
            | Self::InvalidIssueInstant(_)
            | Self::InvalidAudience { .. }
            | Self::InvalidDestination { .. }
            | Self::InResponseToMismatch { .. }
            | Self::InvalidSubjectConfirmation(_)
            | Self::MissingSpType
            | Self::InconsistentSpType
            | Self::InvalidAcsUrl(_)
            | Self::UnsupportedBinding(_)
            | Self::Attribute(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_) => status_codes::REQUESTER,
            _ => status_codes::RESPONDER,
        }
    }

    /// Returns a sub-status code if applicable.
    #[must_use]
    pub const fn sub_status_code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidLoa(_) => Some(sub_status_codes::NO_AUTHN_CONTEXT),
            Self::Attribute(_) => Some(sub_status_codes::INVALID_ATTR_NAME_OR_VALUE),
            Self::UnsupportedBinding(_) => Some(sub_status_codes::UNSUPPORTED_BINDING),
            Self::SignatureInvalid(_)
            | Self::SignatureAlgorithmNotAllowed(_)
            | Self::UntrustedCertificate(_)
            | Self::MissingSpType
            | Self::InconsistentSpType
            | Self::InvalidAcsUrl(_) => Some(sub_status_codes::REQUEST_DENIED),
            _ => None,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidResponse(_)
            | Self::MissingElement(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_)
            | Self::XmlParse(_)
            | Self::InvalidLoa(_)
            | Self::InvalidIssueInstant(_)
            | Self::InvalidDestination { .. }
            | Self::InResponseToMismatch { .. }
            | Self::MissingSpType
            | Self::InconsistentSpType
            | Self::InvalidAcsUrl(_)
            | Self::UnsupportedBinding(_)
            | Self::Attribute(_) => 400,
            Self::SignatureInvalid(_)
            | Self::SignatureAlgorithmNotAllowed(_)
            | Self::UntrustedCertificate(_)
            | Self::AssertionExpired
            | Self::AssertionNotYetValid
            | Self::InvalidAudience { .. }
            | Self::InvalidSubjectConfirmation(_) => 401,
            _ => 500,
        }
    }

    /// Returns the eIDAS error key for this error.
    #[must_use]
    pub const fn error_key(&self) -> &'static str {
        match self {
            Self::UnencryptedResponse => "SAML_ENGINE_UNENCRYPTED_RESPONSE",
            Self::InvalidCertificate(_) => "SAML_ENGINE_INVALID_CERTIFICATE",
            Self::UntrustedCertificate(_) => "SAML_ENGINE_UNTRUSTED_CERTIFICATE",
            Self::SignatureInvalid(_) => "INVALID_SIGNATURE",
            Self::SignatureAlgorithmNotAllowed(_) => "INVALID_SIGNATURE_ALGORITHM",
            Self::SignatureCreation(_) => "SAML_ENGINE_SIGNATURE_FAILURE",
            Self::EncryptionAlgorithmNotAllowed(_) => "INVALID_ENCRYPTION_ALGORITHM",
            Self::Encryption(_) => "SAML_ENGINE_ENCRYPTING_RESPONSE",
            Self::Decryption(_) => "SAML_ENGINE_DECRYPTING_RESPONSE",
            Self::InvalidLoa(_) => "INVALID_LOA",
            Self::MissingSpType => "COLLEAGUE_REQ_MISSING_SPTYPE",
            Self::InconsistentSpType => "COLLEAGUE_REQ_INCONSISTENT_SPTYPE",
            Self::InvalidAcsUrl(_) => "INVALID_ASSERTION_CONSUMER_URL",
            Self::UnsupportedBinding(_) => "INVALID_PROTOCOL_BINDING",
            Self::Attribute(_) => "INVALID_ATTRIBUTE_VALUE",
            Self::InvalidRequest(_)
            | Self::MissingElement(_)
            | Self::InvalidIssueInstant(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_)
            | Self::XmlParse(_) => "COLLEAGUE_REQ_INVALID_SAML",
            Self::InvalidResponse(_)
            | Self::AssertionExpired
            | Self::AssertionNotYetValid
            | Self::InvalidAudience { .. }
            | Self::InResponseToMismatch { .. }
            | Self::InvalidSubjectConfirmation(_) => "COLLEAGUE_RESP_INVALID_SAML",
            Self::InvalidDestination { .. } => "COLLEAGUE_REQ_INVALID_DEST_URL",
            Self::Crypto(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::Deflate(err.to_string())
    }
}

impl From<eidas_core::Error> for SamlError {
    fn from(err: eidas_core::Error) -> Self {
        Self::Attribute(err.to_string())
    }
}

impl From<eidas_crypto::SignatureError> for SamlError {
    fn from(err: eidas_crypto::SignatureError) -> Self {
        match err {
            eidas_crypto::SignatureError::InvalidCertificate(msg) => Self::InvalidCertificate(msg),
            eidas_crypto::SignatureError::Verification => {
                Self::SignatureInvalid("signature value does not verify".to_string())
            }
            eidas_crypto::SignatureError::Signing(msg) => Self::SignatureCreation(msg),
            other => Self::Crypto(other.to_string()),
        }
    }
}

impl From<eidas_crypto::encryption::EncryptionError> for SamlError {
    fn from(err: eidas_crypto::encryption::EncryptionError) -> Self {
        use eidas_crypto::encryption::EncryptionError;
        match err {
            EncryptionError::NotAllowed(uri) => Self::EncryptionAlgorithmNotAllowed(uri),
            EncryptionError::Decryption => Self::Decryption(err.to_string()),
            other => Self::Encryption(other.to_string()),
        }
    }
}
