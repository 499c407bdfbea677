//! XML Encryption primitives.
//!
//! The content of an encrypted assertion is protected with AES-GCM under a
//! random content encryption key (CEK). The CEK reaches the recipient either
//! by key transport (RSA-OAEP under the recipient's RSA key) or by key
//! agreement (ephemeral-static ECDH, ConcatKDF, AES key wrap) for EC
//! recipients.
//!
//! ## Modules
//!
//! - [`cipher`] - AES-GCM content encryption
//! - [`key_transport`] - RSA-OAEP
//! - [`key_agreement`] - ECDH-ES with ConcatKDF
//! - [`key_wrap`] - AES key wrap (RFC 3394)

pub mod cipher;
pub mod key_agreement;
pub mod key_transport;
pub mod key_wrap;

use thiserror::Error;

use crate::random::random_bytes;

/// `xenc:EncryptedData` type for an encrypted element.
pub const TYPE_ELEMENT: &str = "http://www.w3.org/2001/04/xmlenc#Element";
/// AES-128-GCM.
pub const AES128_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes128-gcm";
/// AES-192-GCM.
pub const AES192_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes192-gcm";
/// AES-256-GCM.
pub const AES256_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes256-gcm";
/// RSA-OAEP with MGF1-SHA1 (XML Enc 1.0).
pub const RSA_OAEP_MGF1P: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";
/// RSA-OAEP with configurable MGF (XML Enc 1.1).
pub const RSA_OAEP: &str = "http://www.w3.org/2009/xmlenc11#rsa-oaep";
/// MGF1 with SHA-1.
pub const MGF1_SHA1: &str = "http://www.w3.org/2009/xmlenc11#mgf1sha1";
/// MGF1 with SHA-256.
pub const MGF1_SHA256: &str = "http://www.w3.org/2009/xmlenc11#mgf1sha256";
/// MGF1 with SHA-384.
pub const MGF1_SHA384: &str = "http://www.w3.org/2009/xmlenc11#mgf1sha384";
/// MGF1 with SHA-512.
pub const MGF1_SHA512: &str = "http://www.w3.org/2009/xmlenc11#mgf1sha512";
/// AES-128 key wrap.
pub const KW_AES128: &str = "http://www.w3.org/2001/04/xmlenc#kw-aes128";
/// AES-256 key wrap.
pub const KW_AES256: &str = "http://www.w3.org/2001/04/xmlenc#kw-aes256";
/// Ephemeral-static ECDH agreement method.
pub const ECDH_ES: &str = "http://www.w3.org/2009/xmlenc11#ECDH-ES";
/// ConcatKDF key derivation method.
pub const CONCAT_KDF: &str = "http://www.w3.org/2009/xmlenc11#ConcatKDF";

/// Error type for encryption operations.
#[derive(Debug, Error)]
pub enum EncryptionError {
    /// Algorithm URI is unknown or unsupported.
    #[error("unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Algorithm is supported but not whitelisted.
    #[error("encryption algorithm not allowed: {0}")]
    NotAllowed(String),

    /// Key material could not be used.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("encryption failed")]
    Encryption,

    /// Decryption or authentication tag check failed.
    #[error("decryption failed")]
    Decryption,
}

/// Content (data) encryption algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataEncryptionAlgorithm {
    /// AES-128-GCM.
    Aes128Gcm,
    /// AES-192-GCM.
    Aes192Gcm,
    /// AES-256-GCM.
    Aes256Gcm,
}

impl DataEncryptionAlgorithm {
    /// Returns the algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Aes128Gcm => AES128_GCM,
            Self::Aes192Gcm => AES192_GCM,
            Self::Aes256Gcm => AES256_GCM,
        }
    }

    /// Parses an algorithm URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri.trim() {
            AES128_GCM => Some(Self::Aes128Gcm),
            AES192_GCM => Some(Self::Aes192Gcm),
            AES256_GCM => Some(Self::Aes256Gcm),
            _ => None,
        }
    }

    /// Returns the key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes192Gcm => 24,
            Self::Aes256Gcm => 32,
        }
    }

    /// Generates a random content encryption key for this algorithm.
    #[must_use]
    pub fn generate_key(self) -> Vec<u8> {
        random_bytes(self.key_len())
    }
}

/// Parses a `;` separated algorithm whitelist into distinct, trimmed URIs.
#[must_use]
pub fn parse_whitelist(value: &str) -> Vec<String> {
    let mut uris: Vec<String> = Vec::new();
    for uri in value.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        if !uris.iter().any(|u| u == uri) {
            uris.push(uri.to_string());
        }
    }
    uris
}

/// Fails with [`EncryptionError::NotAllowed`] unless `uri` is in `whitelist`.
///
/// An empty whitelist allows nothing.
pub fn check_whitelisted(uri: &str, whitelist: &[String]) -> Result<(), EncryptionError> {
    if whitelist.iter().any(|allowed| allowed == uri) {
        Ok(())
    } else {
        Err(EncryptionError::NotAllowed(uri.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_values_are_distinct() {
        let list = parse_whitelist(&format!("{AES128_GCM}; {AES256_GCM} ;{AES128_GCM};"));
        assert_eq!(list, vec![AES128_GCM.to_string(), AES256_GCM.to_string()]);
    }

    #[test]
    fn whitelist_check() {
        let list = parse_whitelist(AES256_GCM);
        assert!(check_whitelisted(AES256_GCM, &list).is_ok());
        assert!(matches!(
            check_whitelisted(AES128_GCM, &list),
            Err(EncryptionError::NotAllowed(_))
        ));
        assert!(check_whitelisted(AES256_GCM, &[]).is_err());
    }

    #[test]
    fn data_algorithms() {
        assert_eq!(
            DataEncryptionAlgorithm::from_uri(AES192_GCM),
            Some(DataEncryptionAlgorithm::Aes192Gcm)
        );
        assert_eq!(DataEncryptionAlgorithm::Aes256Gcm.generate_key().len(), 32);
        assert!(DataEncryptionAlgorithm::from_uri("http://www.w3.org/2001/04/xmlenc#aes256-cbc").is_none());
    }
}
