//! Assertion encryption.
//!
//! Assertions are encrypted with AES-GCM under a fresh content key. The key
//! travels inline in an `xenc:EncryptedKey`: RSA-OAEP key transport for RSA
//! recipients, ECDH-ES key agreement with ConcatKDF and AES key wrap for EC
//! recipients.
//!
//! ## NIST 800-53 Rev5 Controls
//!
//! - SC-8: Transmission confidentiality and integrity
//! - SC-12: Cryptographic key establishment and management
//! - SC-13: Cryptographic protection

mod decrypter;
mod encrypter;

pub use decrypter::AssertionDecrypter;
pub use encrypter::AssertionEncrypter;

use eidas_core::config::SamlConfig;
use eidas_crypto::encryption::key_transport::OaepParams;
use eidas_crypto::encryption::key_wrap::KeyWrapAlgorithm;
use eidas_crypto::encryption::{
    AES128_GCM, AES192_GCM, AES256_GCM, DataEncryptionAlgorithm, ECDH_ES, parse_whitelist,
};
use eidas_crypto::pem::pem_to_der;
use eidas_crypto::{Certificate, DigestAlgorithm};

use crate::error::{SamlError, SamlResult};

/// A private key with the certificate it belongs to.
#[derive(Clone)]
pub struct DecryptionCredential {
    /// Certificate of the key.
    pub certificate: Certificate,
    private_key_der: Vec<u8>,
}

impl std::fmt::Debug for DecryptionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionCredential")
            .field("certificate", &self.certificate.subject())
            .finish_non_exhaustive()
    }
}

impl DecryptionCredential {
    /// Creates a credential from a PKCS#8 DER private key.
    #[must_use]
    pub const fn new(certificate: Certificate, private_key_der: Vec<u8>) -> Self {
        Self {
            certificate,
            private_key_der,
        }
    }

    /// Creates a credential from PEM key and certificate.
    pub fn from_pem(private_key_pem: &str, certificate_pem: &str) -> SamlResult<Self> {
        Ok(Self::new(
            Certificate::from_pem(certificate_pem)?,
            pem_to_der(private_key_pem)?,
        ))
    }

    pub(crate) fn private_key_der(&self) -> &[u8] {
        &self.private_key_der
    }
}

/// Encryption settings of the engine.
#[derive(Debug, Clone)]
pub struct EncryptionConfiguration {
    /// Responses must carry encrypted assertions.
    pub response_encryption_mandatory: bool,
    /// Reject certificates outside their validity period.
    pub check_validity_period: bool,
    /// Reject self-signed certificates.
    pub disallow_self_signed: bool,
    /// Emit the recipient certificate in the key info.
    pub assertion_encrypt_with_key: bool,
    /// Keys able to decrypt incoming assertions.
    pub decryption_credentials: Vec<DecryptionCredential>,
    /// Default recipient certificates for outgoing assertions.
    pub encryption_certificates: Vec<Certificate>,
    /// Content encryption algorithm.
    pub data_encryption_algorithm: DataEncryptionAlgorithm,
    /// Key transport parameters for RSA recipients.
    pub key_transport: OaepParams,
    /// Key wrap algorithm for EC recipients.
    pub key_wrap_algorithm: KeyWrapAlgorithm,
    /// Key agreement method URI for EC recipients.
    pub key_agreement_method: String,
    /// ConcatKDF digest.
    pub kdf_digest: DigestAlgorithm,
    /// Provider label, carried for configuration compatibility.
    pub jca_provider_name: Option<String>,
    /// Allowed data encryption algorithm URIs.
    pub encryption_algorithm_whitelist: Vec<String>,
}

impl Default for EncryptionConfiguration {
    fn default() -> Self {
        Self {
            response_encryption_mandatory: true,
            check_validity_period: true,
            disallow_self_signed: false,
            assertion_encrypt_with_key: true,
            decryption_credentials: Vec::new(),
            encryption_certificates: Vec::new(),
            data_encryption_algorithm: DataEncryptionAlgorithm::Aes256Gcm,
            key_transport: OaepParams::default(),
            key_wrap_algorithm: KeyWrapAlgorithm::Aes256,
            key_agreement_method: ECDH_ES.to_string(),
            kdf_digest: DigestAlgorithm::Sha256,
            jca_provider_name: None,
            encryption_algorithm_whitelist: default_whitelist(),
        }
    }
}

fn default_whitelist() -> Vec<String> {
    [AES128_GCM, AES192_GCM, AES256_GCM]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl EncryptionConfiguration {
    /// Builds the configuration from the node's SAML settings.
    ///
    /// Credentials are not loaded here.
    pub fn from_saml_config(config: &SamlConfig) -> SamlResult<Self> {
        let data_encryption_algorithm =
            DataEncryptionAlgorithm::from_uri(&config.data_encryption_algorithm).ok_or_else(|| {
                SamlError::EncryptionAlgorithmNotAllowed(config.data_encryption_algorithm.clone())
            })?;
        Ok(Self {
            response_encryption_mandatory: config.response_encryption_mandatory,
            check_validity_period: config.check_validity_period,
            disallow_self_signed: config.disallow_self_signed,
            data_encryption_algorithm,
            ..Self::default()
        }
        .with_whitelist(&config.encryption_algorithm_whitelist))
    }

    /// Replaces the whitelist by the distinct values of a `;` separated
    /// list; an empty list keeps the default.
    #[must_use]
    pub fn with_whitelist(mut self, whitelist: &str) -> Self {
        let parsed = parse_whitelist(whitelist);
        self.encryption_algorithm_whitelist = if parsed.is_empty() {
            default_whitelist()
        } else {
            parsed
        };
        self
    }

    /// Adds a decryption credential.
    #[must_use]
    pub fn with_decryption_credential(mut self, credential: DecryptionCredential) -> Self {
        self.decryption_credentials.push(credential);
        self
    }

    /// Adds a default recipient certificate.
    #[must_use]
    pub fn with_encryption_certificate(mut self, certificate: Certificate) -> Self {
        self.encryption_certificates.push(certificate);
        self
    }

    /// Sets the data encryption algorithm.
    #[must_use]
    pub const fn with_data_encryption_algorithm(mut self, algorithm: DataEncryptionAlgorithm) -> Self {
        self.data_encryption_algorithm = algorithm;
        self
    }

    /// Sets whether responses must be encrypted.
    #[must_use]
    pub const fn with_response_encryption_mandatory(mut self, mandatory: bool) -> Self {
        self.response_encryption_mandatory = mandatory;
        self
    }

    /// Sets the certificate validity period check.
    #[must_use]
    pub const fn with_validity_check(mut self, check: bool) -> Self {
        self.check_validity_period = check;
        self
    }

    /// Sets the self-signed certificate policy.
    #[must_use]
    pub const fn with_self_signed_disallowed(mut self, disallow: bool) -> Self {
        self.disallow_self_signed = disallow;
        self
    }
}
