//! Assertion encryption for a recipient certificate.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use eidas_crypto::certificate::check_certificate_policy;
use eidas_crypto::encryption::key_agreement::{self, ConcatKdfParams, to_kdf_hex};
use eidas_crypto::encryption::{CONCAT_KDF, check_whitelisted, cipher, key_transport};
use eidas_crypto::{Certificate, KeyType};
use tracing::debug;

use super::EncryptionConfiguration;
use crate::error::{SamlError, SamlResult};
use crate::types::{AgreementMethod, EncryptedAssertion, EncryptedData, EncryptedKey};
use crate::xml::dom::Element;

/// Encrypts assertions according to an [`EncryptionConfiguration`].
#[derive(Debug, Clone)]
pub struct AssertionEncrypter {
    config: EncryptionConfiguration,
}

impl AssertionEncrypter {
    /// Creates an encrypter.
    #[must_use]
    pub const fn new(config: EncryptionConfiguration) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EncryptionConfiguration {
        &self.config
    }

    /// Encrypts the (signed) assertion element for `recipient`.
    pub fn encrypt(&self, assertion: &Element, recipient: &Certificate) -> SamlResult<EncryptedAssertion> {
        let algorithm = self.config.data_encryption_algorithm;
        check_whitelisted(algorithm.uri(), &self.config.encryption_algorithm_whitelist)?;
        check_certificate_policy(
            recipient,
            self.config.check_validity_period,
            self.config.disallow_self_signed,
            Utc::now(),
        )?;

        let cek = algorithm.generate_key();
        let cipher_value = cipher::encrypt(algorithm, &cek, assertion.to_canonical_string().as_bytes())?;

        let encrypted_key = match recipient.key_type() {
            KeyType::Rsa { .. } => self.transport_key(recipient, &cek)?,
            KeyType::Ec(_) => self.agree_key(recipient, &cek)?,
        };
        debug!(
            algorithm = algorithm.uri(),
            key = %encrypted_key.encryption_method,
            recipient = recipient.subject(),
            "assertion encrypted"
        );

        Ok(EncryptedAssertion {
            encrypted_data: EncryptedData {
                encryption_method: algorithm.uri().to_string(),
                encrypted_keys: vec![encrypted_key],
                cipher_value: STANDARD.encode(cipher_value),
            },
        })
    }

    fn recipient_certificate(&self, recipient: &Certificate) -> Option<String> {
        self.config
            .assertion_encrypt_with_key
            .then(|| recipient.to_base64())
    }

    fn transport_key(&self, recipient: &Certificate, cek: &[u8]) -> SamlResult<EncryptedKey> {
        let params = &self.config.key_transport;
        let encrypted = key_transport::encrypt_key(params, recipient, cek)?;
        Ok(EncryptedKey {
            encryption_method: params.algorithm.clone(),
            digest_method: Some(params.digest.uri().to_string()),
            mgf: params.mgf.clone(),
            agreement_method: None,
            recipient_certificate: self.recipient_certificate(recipient),
            cipher_value: STANDARD.encode(encrypted),
        })
    }

    fn agree_key(&self, recipient: &Certificate, cek: &[u8]) -> SamlResult<EncryptedKey> {
        let wrap = self.config.key_wrap_algorithm;
        let params = ConcatKdfParams {
            digest: self.config.kdf_digest,
            algorithm_id: wrap.uri().as_bytes().to_vec(),
            ..ConcatKdfParams::default()
        };
        let agreed = key_agreement::encrypt_key(recipient, wrap, &params, cek)
            .map_err(|e| SamlError::Encryption(e.to_string()))?;

        Ok(EncryptedKey {
            encryption_method: wrap.uri().to_string(),
            digest_method: None,
            mgf: None,
            agreement_method: Some(AgreementMethod {
                algorithm: self.config.key_agreement_method.clone(),
                key_derivation_method: CONCAT_KDF.to_string(),
                kdf_digest_method: params.digest.uri().to_string(),
                algorithm_id: to_kdf_hex(&params.algorithm_id),
                party_u_info: to_kdf_hex(&params.party_u_info),
                party_v_info: to_kdf_hex(&params.party_v_info),
                originator_public_key: STANDARD.encode(agreed.originator_public_key),
                recipient_certificate: self.recipient_certificate(recipient),
            }),
            recipient_certificate: None,
            cipher_value: STANDARD.encode(agreed.wrapped_key),
        })
    }
}
