//! Cryptographic algorithm definitions.
//!
//! Algorithms are identified on the wire by their XML-DSig URIs and in
//! configuration by `;` separated URI lists (whitelists).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for algorithm operations.
#[derive(Debug, Error)]
pub enum AlgorithmError {
    /// Unknown algorithm.
    #[error("unknown algorithm: {0}")]
    Unknown(String),

    /// Algorithm is known but not allowed by the configured whitelist.
    #[error("algorithm '{0}' is not allowed")]
    NotAllowed(String),
}

/// Message digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-1, accepted for legacy metadata only.
    #[serde(rename = "SHA-1")]
    Sha1,
    /// SHA-256.
    #[serde(rename = "SHA-256")]
    Sha256,
    /// SHA-384.
    #[serde(rename = "SHA-384")]
    Sha384,
    /// SHA-512.
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl DigestAlgorithm {
    /// Returns the output length in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Returns the algorithm name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Returns the XML-DSig digest method URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Sha1 => "http://www.w3.org/2000/09/xmldsig#sha1",
            Self::Sha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
            Self::Sha384 => "http://www.w3.org/2001/04/xmldsig-more#sha384",
            Self::Sha512 => "http://www.w3.org/2001/04/xmlenc#sha512",
        }
    }

    /// Parses an algorithm name such as `SHA-256` or `SHA256`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().replace('-', "").as_str() {
            "SHA1" => Some(Self::Sha1),
            "SHA256" => Some(Self::Sha256),
            "SHA384" => Some(Self::Sha384),
            "SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Parses an XML-DSig digest method URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://www.w3.org/2000/09/xmldsig#sha1" => Some(Self::Sha1),
            "http://www.w3.org/2001/04/xmlenc#sha256" => Some(Self::Sha256),
            "http://www.w3.org/2001/04/xmldsig-more#sha384" => Some(Self::Sha384),
            "http://www.w3.org/2001/04/xmlenc#sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

/// XML-DSig signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-256.
    RsaSha256,
    /// RSA PKCS#1 v1.5 with SHA-384.
    RsaSha384,
    /// RSA PKCS#1 v1.5 with SHA-512.
    RsaSha512,
    /// RSASSA-PSS with SHA-256 and MGF1.
    RsaPssSha256,
    /// RSASSA-PSS with SHA-384 and MGF1.
    RsaPssSha384,
    /// RSASSA-PSS with SHA-512 and MGF1.
    RsaPssSha512,
    /// ECDSA with SHA-256 (P-256).
    EcdsaSha256,
    /// ECDSA with SHA-384 (P-384).
    EcdsaSha384,
    /// ECDSA with SHA-512 (P-521).
    EcdsaSha512,
}

impl SignatureAlgorithm {
    /// All supported algorithms.
    pub const ALL: [Self; 9] = [
        Self::RsaSha256,
        Self::RsaSha384,
        Self::RsaSha512,
        Self::RsaPssSha256,
        Self::RsaPssSha384,
        Self::RsaPssSha512,
        Self::EcdsaSha256,
        Self::EcdsaSha384,
        Self::EcdsaSha512,
    ];

    /// Returns the XML-DSig signature method URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::RsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            Self::RsaSha384 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384",
            Self::RsaSha512 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
            Self::RsaPssSha256 => "http://www.w3.org/2007/05/xmldsig-more#sha256-rsa-MGF1",
            Self::RsaPssSha384 => "http://www.w3.org/2007/05/xmldsig-more#sha384-rsa-MGF1",
            Self::RsaPssSha512 => "http://www.w3.org/2007/05/xmldsig-more#sha512-rsa-MGF1",
            Self::EcdsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256",
            Self::EcdsaSha384 => "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384",
            Self::EcdsaSha512 => "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512",
        }
    }

    /// Parses a signature method URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.uri() == uri.trim())
    }

    /// Returns the digest algorithm paired with this signature algorithm.
    #[must_use]
    pub const fn digest_algorithm(self) -> DigestAlgorithm {
        match self {
            Self::RsaSha256 | Self::RsaPssSha256 | Self::EcdsaSha256 => DigestAlgorithm::Sha256,
            Self::RsaSha384 | Self::RsaPssSha384 | Self::EcdsaSha384 => DigestAlgorithm::Sha384,
            Self::RsaSha512 | Self::RsaPssSha512 | Self::EcdsaSha512 => DigestAlgorithm::Sha512,
        }
    }

    /// Returns true for RSA based algorithms.
    #[must_use]
    pub const fn is_rsa(self) -> bool {
        !self.is_ecdsa()
    }

    /// Returns true for ECDSA based algorithms.
    #[must_use]
    pub const fn is_ecdsa(self) -> bool {
        matches!(self, Self::EcdsaSha256 | Self::EcdsaSha384 | Self::EcdsaSha512)
    }
}

/// Parses a `;` separated list of signature method URIs.
///
/// Unknown URIs are reported as errors so configuration mistakes surface at
/// start-up instead of silently narrowing the accepted set.
pub fn parse_signature_whitelist(value: &str) -> Result<Vec<SignatureAlgorithm>, AlgorithmError> {
    let mut algorithms = Vec::new();
    for uri in value.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let alg =
            SignatureAlgorithm::from_uri(uri).ok_or_else(|| AlgorithmError::Unknown(uri.to_string()))?;
        if !algorithms.contains(&alg) {
            algorithms.push(alg);
        }
    }
    Ok(algorithms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_names() {
        assert_eq!(DigestAlgorithm::from_name("SHA-256"), Some(DigestAlgorithm::Sha256));
        assert_eq!(DigestAlgorithm::from_name("sha512"), Some(DigestAlgorithm::Sha512));
        assert_eq!(DigestAlgorithm::from_name("MD5"), None);
        assert_eq!(DigestAlgorithm::Sha384.output_len(), 48);
    }

    #[test]
    fn digest_uris_round_trip() {
        for alg in [
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ] {
            assert_eq!(DigestAlgorithm::from_uri(alg.uri()), Some(alg));
        }
    }

    #[test]
    fn signature_uris() {
        assert_eq!(
            SignatureAlgorithm::from_uri("http://www.w3.org/2007/05/xmldsig-more#sha256-rsa-MGF1"),
            Some(SignatureAlgorithm::RsaPssSha256)
        );
        assert!(SignatureAlgorithm::EcdsaSha384.is_ecdsa());
        assert!(SignatureAlgorithm::RsaSha512.is_rsa());
        assert_eq!(
            SignatureAlgorithm::EcdsaSha512.digest_algorithm(),
            DigestAlgorithm::Sha512
        );
    }

    #[test]
    fn whitelist_parsing() {
        let list = parse_signature_whitelist(
            " http://www.w3.org/2001/04/xmldsig-more#rsa-sha256 ;\
             http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256;;\
             http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
        )
        .unwrap();
        assert_eq!(
            list,
            vec![SignatureAlgorithm::RsaSha256, SignatureAlgorithm::EcdsaSha256]
        );

        let err = parse_signature_whitelist("http://www.w3.org/2000/09/xmldsig#rsa-sha1").unwrap_err();
        assert!(matches!(err, AlgorithmError::Unknown(_)));
    }
}
