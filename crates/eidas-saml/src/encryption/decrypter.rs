//! Assertion decryption with the node's credentials.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use eidas_crypto::encryption::key_agreement::{self, ConcatKdfParams, from_kdf_hex};
use eidas_crypto::encryption::key_transport::{self, OaepParams};
use eidas_crypto::encryption::key_wrap::KeyWrapAlgorithm;
use eidas_crypto::encryption::{
    DataEncryptionAlgorithm, EncryptionError, check_whitelisted, cipher,
};
use eidas_crypto::{DigestAlgorithm, KeyType};
use tracing::{debug, warn};

use super::{DecryptionCredential, EncryptionConfiguration};
use crate::error::{SamlError, SamlResult};
use crate::types::{AgreementMethod, EncryptedAssertion, EncryptedKey};
use crate::xml::dom::{self, Element};

/// Decrypts assertions according to an [`EncryptionConfiguration`].
#[derive(Debug, Clone)]
pub struct AssertionDecrypter {
    config: EncryptionConfiguration,
}

fn decode(value: &str) -> SamlResult<Vec<u8>> {
    let compact: String = value.split_whitespace().collect();
    Ok(STANDARD.decode(compact)?)
}

impl AssertionDecrypter {
    /// Creates a decrypter.
    #[must_use]
    pub const fn new(config: EncryptionConfiguration) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EncryptionConfiguration {
        &self.config
    }

    /// Decrypts every encrypted assertion.
    ///
    /// Fails with [`SamlError::UnencryptedResponse`] when there is none and
    /// encryption is mandatory.
    pub fn decrypt_all(&self, encrypted: &[EncryptedAssertion]) -> SamlResult<Vec<Element>> {
        if encrypted.is_empty() && self.config.response_encryption_mandatory {
            return Err(SamlError::UnencryptedResponse);
        }
        encrypted.iter().map(|e| self.decrypt(e)).collect()
    }

    /// Decrypts one assertion and returns the parsed assertion element.
    ///
    /// Every usable credential is tried against every encrypted key.
    pub fn decrypt(&self, encrypted: &EncryptedAssertion) -> SamlResult<Element> {
        let data = &encrypted.encrypted_data;
        let algorithm = DataEncryptionAlgorithm::from_uri(&data.encryption_method)
            .ok_or_else(|| SamlError::EncryptionAlgorithmNotAllowed(data.encryption_method.clone()))?;
        check_whitelisted(algorithm.uri(), &self.config.encryption_algorithm_whitelist)?;

        let credentials = self.usable_credentials();
        if credentials.is_empty() {
            return Err(SamlError::InvalidCertificate(
                "no valid decryption certificate".to_string(),
            ));
        }
        let cipher_value = decode(&data.cipher_value)?;

        for credential in &credentials {
            for key in &data.encrypted_keys {
                let cek = match unwrap_content_key(credential, key) {
                    Ok(cek) if cek.len() == algorithm.key_len() => cek,
                    Ok(_) => continue,
                    Err(err) => {
                        debug!(
                            certificate = credential.certificate.subject(),
                            error = %err,
                            "content key not recovered"
                        );
                        continue;
                    }
                };
                let Ok(plaintext) = cipher::decrypt(algorithm, &cek, &cipher_value) else {
                    continue;
                };
                let xml = String::from_utf8(plaintext)
                    .map_err(|e| SamlError::Decryption(format!("plaintext is not UTF-8: {e}")))?;
                let element = dom::parse(&xml)?;
                if element.local_name() != "Assertion" {
                    return Err(SamlError::Decryption(format!(
                        "decrypted {} instead of an assertion",
                        element.local_name()
                    )));
                }
                return Ok(element);
            }
        }

        warn!(keys = data.encrypted_keys.len(), "no credential decrypted the assertion");
        Err(SamlError::Decryption("no credential could decrypt the assertion".to_string()))
    }

    fn usable_credentials(&self) -> Vec<&DecryptionCredential> {
        let now = Utc::now();
        self.config
            .decryption_credentials
            .iter()
            .filter(|c| {
                let usable = !self.config.check_validity_period || c.certificate.is_valid_at(now);
                if !usable {
                    warn!(
                        certificate = c.certificate.subject(),
                        "decryption certificate outside its validity period"
                    );
                }
                usable
            })
            .collect()
    }
}

fn unwrap_content_key(credential: &DecryptionCredential, key: &EncryptedKey) -> SamlResult<Vec<u8>> {
    let encrypted = decode(&key.cipher_value)?;
    match (&key.agreement_method, credential.certificate.key_type()) {
        (Some(agreement), KeyType::Ec(curve)) => {
            let wrap = KeyWrapAlgorithm::from_uri(&key.encryption_method).ok_or_else(|| {
                SamlError::EncryptionAlgorithmNotAllowed(key.encryption_method.clone())
            })?;
            let params = kdf_params(agreement)?;
            Ok(key_agreement::decrypt_key(
                credential.private_key_der(),
                curve,
                &decode(&agreement.originator_public_key)?,
                wrap,
                &params,
                &encrypted,
            )?)
        }
        (None, KeyType::Rsa { .. }) => {
            let params = OaepParams {
                algorithm: key.encryption_method.clone(),
                digest: oaep_digest(key)?,
                mgf: key.mgf.clone(),
            };
            Ok(key_transport::decrypt_key(
                &params,
                credential.private_key_der(),
                &encrypted,
            )?)
        }
        _ => Err(EncryptionError::InvalidKey("credential does not match the key scheme".to_string()).into()),
    }
}

fn oaep_digest(key: &EncryptedKey) -> SamlResult<DigestAlgorithm> {
    match key.digest_method.as_deref() {
        Some(uri) => DigestAlgorithm::from_uri(uri)
            .ok_or_else(|| SamlError::EncryptionAlgorithmNotAllowed(uri.to_string())),
        // XML Enc defaults the OAEP digest to SHA-1.
        None => Ok(DigestAlgorithm::Sha1),
    }
}

fn kdf_params(agreement: &AgreementMethod) -> SamlResult<ConcatKdfParams> {
    let digest = DigestAlgorithm::from_uri(&agreement.kdf_digest_method).ok_or_else(|| {
        SamlError::EncryptionAlgorithmNotAllowed(agreement.kdf_digest_method.clone())
    })?;
    Ok(ConcatKdfParams {
        digest,
        algorithm_id: from_kdf_hex(&agreement.algorithm_id)?,
        party_u_info: from_kdf_hex(&agreement.party_u_info)?,
        party_v_info: from_kdf_hex(&agreement.party_v_info)?,
    })
}
