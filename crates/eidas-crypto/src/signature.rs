//! Digital signature operations.
//!
//! Signatures use the XML-DSig encodings: PKCS#1 v1.5 or PSS for RSA and the
//! fixed-length `r || s` form for ECDSA.
//!
//! ## NIST 800-53 Rev5: SC-13 (Cryptographic Protection)

use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::{self, EcdsaKeyPair, KeyPair, RsaKeyPair, UnparsedPublicKey};
use thiserror::Error;

use crate::algorithm::SignatureAlgorithm;
use crate::certificate::{Certificate, EcCurve, KeyType};
use crate::pem::pem_to_der;

/// Error type for signature operations.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Verification failed.
    #[error("signature verification failed")]
    Verification,

    /// Invalid key format.
    #[error("invalid key format: {0}")]
    InvalidKey(String),

    /// Invalid or unacceptable certificate.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Algorithm not supported for this key.
    #[error("algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),
}

/// Private key used to sign SAML messages and metadata.
pub enum SigningKey {
    /// RSA key pair.
    Rsa(RsaKeyPair),
    /// ECDSA key pair, bound to the algorithm it was loaded for.
    Ec(EcdsaKeyPair, SignatureAlgorithm),
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rsa(_) => f.write_str("SigningKey::Rsa(..)"),
            Self::Ec(_, alg) => write!(f, "SigningKey::Ec(.., {alg:?})"),
        }
    }
}

impl SigningKey {
    /// Loads an RSA key from PKCS#8 or PKCS#1 DER.
    pub fn rsa_from_der(der: &[u8]) -> Result<Self, SignatureError> {
        RsaKeyPair::from_pkcs8(der)
            .or_else(|_| RsaKeyPair::from_der(der))
            .map(Self::Rsa)
            .map_err(|e| SignatureError::InvalidKey(format!("invalid RSA key: {e}")))
    }

    /// Loads an EC key from PKCS#8 DER for the given curve.
    pub fn ec_from_pkcs8(der: &[u8], curve: EcCurve) -> Result<Self, SignatureError> {
        let (signing_alg, alg): (&'static signature::EcdsaSigningAlgorithm, _) = match curve {
            EcCurve::P256 => (
                &signature::ECDSA_P256_SHA256_FIXED_SIGNING,
                SignatureAlgorithm::EcdsaSha256,
            ),
            EcCurve::P384 => (
                &signature::ECDSA_P384_SHA384_FIXED_SIGNING,
                SignatureAlgorithm::EcdsaSha384,
            ),
            EcCurve::P521 => (
                &signature::ECDSA_P521_SHA512_FIXED_SIGNING,
                SignatureAlgorithm::EcdsaSha512,
            ),
        };
        EcdsaKeyPair::from_pkcs8(signing_alg, der)
            .map(|kp| Self::Ec(kp, alg))
            .map_err(|e| SignatureError::InvalidKey(format!("invalid EC key: {e}")))
    }

    /// Loads a PEM private key matching the key type of `certificate`.
    pub fn from_pem(pem: &str, certificate: &Certificate) -> Result<Self, SignatureError> {
        let der = pem_to_der(pem)?;
        match certificate.key_type() {
            KeyType::Rsa { .. } => Self::rsa_from_der(&der),
            KeyType::Ec(curve) => Self::ec_from_pkcs8(&der, curve),
        }
    }

    /// Returns whether the key can produce signatures of `algorithm`.
    #[must_use]
    pub fn supports(&self, algorithm: SignatureAlgorithm) -> bool {
        match self {
            Self::Rsa(_) => algorithm.is_rsa(),
            Self::Ec(_, alg) => *alg == algorithm,
        }
    }

    /// Returns the algorithm to use when the configured one does not fit the key.
    #[must_use]
    pub const fn default_algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::Rsa(_) => SignatureAlgorithm::RsaPssSha256,
            Self::Ec(_, alg) => *alg,
        }
    }

    /// Returns the public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> Vec<u8> {
        match self {
            Self::Rsa(kp) => kp.public_key().as_ref().to_vec(),
            Self::Ec(kp, _) => kp.public_key().as_ref().to_vec(),
        }
    }

    /// Signs `data` with `algorithm`.
    pub fn sign(&self, algorithm: SignatureAlgorithm, data: &[u8]) -> Result<Vec<u8>, SignatureError> {
        if !self.supports(algorithm) {
            return Err(SignatureError::UnsupportedAlgorithm(format!(
                "{} cannot be used with this key",
                algorithm.uri()
            )));
        }
        let rng = SystemRandom::new();
        match self {
            Self::Rsa(key_pair) => {
                let padding: &'static dyn signature::RsaEncoding = match algorithm {
                    SignatureAlgorithm::RsaSha256 => &signature::RSA_PKCS1_SHA256,
                    SignatureAlgorithm::RsaSha384 => &signature::RSA_PKCS1_SHA384,
                    SignatureAlgorithm::RsaSha512 => &signature::RSA_PKCS1_SHA512,
                    SignatureAlgorithm::RsaPssSha256 => &signature::RSA_PSS_SHA256,
                    SignatureAlgorithm::RsaPssSha384 => &signature::RSA_PSS_SHA384,
                    SignatureAlgorithm::RsaPssSha512 => &signature::RSA_PSS_SHA512,
                    other => {
                        return Err(SignatureError::UnsupportedAlgorithm(other.uri().to_string()));
                    }
                };
                let mut sig = vec![0u8; key_pair.public_modulus_len()];
                key_pair
                    .sign(padding, &rng, data, &mut sig)
                    .map_err(|e| SignatureError::Signing(format!("RSA signing failed: {e}")))?;
                Ok(sig)
            }
            Self::Ec(key_pair, _) => key_pair
                .sign(&rng, data)
                .map(|sig| sig.as_ref().to_vec())
                .map_err(|e| SignatureError::Signing(format!("ECDSA signing failed: {e}"))),
        }
    }
}

/// Verifies `sig` over `data` with the public key of `certificate`.
pub fn verify(
    certificate: &Certificate,
    algorithm: SignatureAlgorithm,
    data: &[u8],
    sig: &[u8],
) -> Result<(), SignatureError> {
    let verification_alg: &'static dyn signature::VerificationAlgorithm =
        match (algorithm, certificate.key_type()) {
            (SignatureAlgorithm::RsaSha256, KeyType::Rsa { .. }) => {
                &signature::RSA_PKCS1_2048_8192_SHA256
            }
            (SignatureAlgorithm::RsaSha384, KeyType::Rsa { .. }) => {
                &signature::RSA_PKCS1_2048_8192_SHA384
            }
            (SignatureAlgorithm::RsaSha512, KeyType::Rsa { .. }) => {
                &signature::RSA_PKCS1_2048_8192_SHA512
            }
            (SignatureAlgorithm::RsaPssSha256, KeyType::Rsa { .. }) => {
                &signature::RSA_PSS_2048_8192_SHA256
            }
            (SignatureAlgorithm::RsaPssSha384, KeyType::Rsa { .. }) => {
                &signature::RSA_PSS_2048_8192_SHA384
            }
            (SignatureAlgorithm::RsaPssSha512, KeyType::Rsa { .. }) => {
                &signature::RSA_PSS_2048_8192_SHA512
            }
            (SignatureAlgorithm::EcdsaSha256, KeyType::Ec(EcCurve::P256)) => {
                &signature::ECDSA_P256_SHA256_FIXED
            }
            (SignatureAlgorithm::EcdsaSha384, KeyType::Ec(EcCurve::P384)) => {
                &signature::ECDSA_P384_SHA384_FIXED
            }
            (SignatureAlgorithm::EcdsaSha512, KeyType::Ec(EcCurve::P521)) => {
                &signature::ECDSA_P521_SHA512_FIXED
            }
            (alg, key) => {
                return Err(SignatureError::UnsupportedAlgorithm(format!(
                    "{} does not match key type {key:?}",
                    alg.uri()
                )));
            }
        };

    UnparsedPublicKey::new(verification_alg, certificate.public_key_bytes())
        .verify(data, sig)
        .map_err(|_| SignatureError::Verification)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_KEY: &str = include_str!("../../../testdata/connector-key.pem");
    const RSA_CERT: &str = include_str!("../../../testdata/connector-cert.pem");
    const OTHER_CERT: &str = include_str!("../../../testdata/proxy-cert.pem");
    const EC_KEY: &str = include_str!("../../../testdata/ec-key.pem");
    const EC_CERT: &str = include_str!("../../../testdata/ec-cert.pem");

    fn rsa() -> (SigningKey, Certificate) {
        let cert = Certificate::from_pem(RSA_CERT).unwrap();
        (SigningKey::from_pem(RSA_KEY, &cert).unwrap(), cert)
    }

    #[test]
    fn signature_error_verification_is_generic() {
        assert_eq!(
            SignatureError::Verification.to_string(),
            "signature verification failed"
        );
    }

    #[test]
    fn rsa_pkcs1_and_pss_round_trip() {
        let (key, cert) = rsa();
        for alg in [
            SignatureAlgorithm::RsaSha256,
            SignatureAlgorithm::RsaSha512,
            SignatureAlgorithm::RsaPssSha256,
            SignatureAlgorithm::RsaPssSha384,
        ] {
            let sig = key.sign(alg, b"signed info").unwrap();
            assert_eq!(sig.len(), 256);
            verify(&cert, alg, b"signed info", &sig).unwrap();
            assert!(verify(&cert, alg, b"tampered", &sig).is_err());
        }
    }

    #[test]
    fn ecdsa_round_trip_uses_fixed_encoding() {
        let cert = Certificate::from_pem(EC_CERT).unwrap();
        let key = SigningKey::from_pem(EC_KEY, &cert).unwrap();
        assert_eq!(key.default_algorithm(), SignatureAlgorithm::EcdsaSha256);

        let sig = key.sign(SignatureAlgorithm::EcdsaSha256, b"data").unwrap();
        assert_eq!(sig.len(), 64);
        verify(&cert, SignatureAlgorithm::EcdsaSha256, b"data", &sig).unwrap();
    }

    #[test]
    fn wrong_certificate_fails() {
        let (key, _) = rsa();
        let other = Certificate::from_pem(OTHER_CERT).unwrap();
        let sig = key.sign(SignatureAlgorithm::RsaSha256, b"data").unwrap();
        assert!(matches!(
            verify(&other, SignatureAlgorithm::RsaSha256, b"data", &sig),
            Err(SignatureError::Verification)
        ));
    }

    #[test]
    fn algorithm_must_match_key() {
        let (key, cert) = rsa();
        assert!(key.sign(SignatureAlgorithm::EcdsaSha256, b"data").is_err());
        assert!(verify(&cert, SignatureAlgorithm::EcdsaSha256, b"data", &[0; 64]).is_err());
    }
}
