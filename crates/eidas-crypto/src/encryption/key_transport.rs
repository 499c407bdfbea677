//! RSA-OAEP key transport.

use aws_lc_rs::rsa::{
    OAEP_SHA1_MGF1SHA1, OAEP_SHA256_MGF1SHA256, OAEP_SHA384_MGF1SHA384, OAEP_SHA512_MGF1SHA512,
    OaepAlgorithm, OaepPrivateDecryptingKey, OaepPublicEncryptingKey, PrivateDecryptingKey,
    PublicEncryptingKey,
};

use super::{EncryptionError, MGF1_SHA1, MGF1_SHA256, MGF1_SHA384, MGF1_SHA512, RSA_OAEP, RSA_OAEP_MGF1P};
use crate::algorithm::DigestAlgorithm;
use crate::certificate::{Certificate, KeyType};

/// RSA-OAEP parameters as carried in `xenc:EncryptionMethod`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OaepParams {
    /// Key transport algorithm URI.
    pub algorithm: String,
    /// `ds:DigestMethod` URI.
    pub digest: DigestAlgorithm,
    /// `xenc11:MGF` URI, absent for `rsa-oaep-mgf1p`.
    pub mgf: Option<String>,
}

impl Default for OaepParams {
    fn default() -> Self {
        Self {
            algorithm: RSA_OAEP.to_string(),
            digest: DigestAlgorithm::Sha256,
            mgf: Some(MGF1_SHA256.to_string()),
        }
    }
}

impl OaepParams {
    /// Parameters for the XML Enc 1.0 `rsa-oaep-mgf1p` algorithm.
    #[must_use]
    pub fn mgf1p() -> Self {
        Self {
            algorithm: RSA_OAEP_MGF1P.to_string(),
            digest: DigestAlgorithm::Sha1,
            mgf: None,
        }
    }

    fn oaep_algorithm(&self) -> Result<&'static OaepAlgorithm, EncryptionError> {
        let mgf_digest = match (self.algorithm.as_str(), self.mgf.as_deref()) {
            (RSA_OAEP_MGF1P, _) | (RSA_OAEP, None | Some(MGF1_SHA1)) => DigestAlgorithm::Sha1,
            (RSA_OAEP, Some(MGF1_SHA256)) => DigestAlgorithm::Sha256,
            (RSA_OAEP, Some(MGF1_SHA384)) => DigestAlgorithm::Sha384,
            (RSA_OAEP, Some(MGF1_SHA512)) => DigestAlgorithm::Sha512,
            (alg, mgf) => {
                return Err(EncryptionError::UnsupportedAlgorithm(format!(
                    "{alg} with MGF {}",
                    mgf.unwrap_or("default")
                )));
            }
        };
        match (self.digest, mgf_digest) {
            (DigestAlgorithm::Sha1, DigestAlgorithm::Sha1) => Ok(&OAEP_SHA1_MGF1SHA1),
            (DigestAlgorithm::Sha256, DigestAlgorithm::Sha256) => Ok(&OAEP_SHA256_MGF1SHA256),
            (DigestAlgorithm::Sha384, DigestAlgorithm::Sha384) => Ok(&OAEP_SHA384_MGF1SHA384),
            (DigestAlgorithm::Sha512, DigestAlgorithm::Sha512) => Ok(&OAEP_SHA512_MGF1SHA512),
            (digest, mgf) => Err(EncryptionError::UnsupportedAlgorithm(format!(
                "OAEP digest {} with MGF1 {}",
                digest.name(),
                mgf.name()
            ))),
        }
    }
}

/// Encrypts a content key for the RSA key of `recipient`.
pub fn encrypt_key(
    params: &OaepParams,
    recipient: &Certificate,
    cek: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    if !matches!(recipient.key_type(), KeyType::Rsa { .. }) {
        return Err(EncryptionError::InvalidKey(
            "key transport requires an RSA certificate".to_string(),
        ));
    }
    let algorithm = params.oaep_algorithm()?;
    let public_key = PublicEncryptingKey::from_der(recipient.spki_der())
        .map_err(|e| EncryptionError::InvalidKey(format!("invalid RSA public key: {e}")))?;
    let key = OaepPublicEncryptingKey::new(public_key)
        .map_err(|_| EncryptionError::InvalidKey("unusable RSA public key".to_string()))?;

    let mut output = vec![0u8; key.ciphertext_size()];
    let ciphertext = key
        .encrypt(algorithm, cek, &mut output, None)
        .map_err(|_| EncryptionError::Encryption)?;
    Ok(ciphertext.to_vec())
}

/// Decrypts a transported content key with a PKCS#8 RSA private key.
pub fn decrypt_key(
    params: &OaepParams,
    private_key_pkcs8: &[u8],
    encrypted_key: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let algorithm = params.oaep_algorithm()?;
    let private_key = PrivateDecryptingKey::from_pkcs8(private_key_pkcs8)
        .map_err(|e| EncryptionError::InvalidKey(format!("invalid RSA private key: {e}")))?;
    let key = OaepPrivateDecryptingKey::new(private_key)
        .map_err(|_| EncryptionError::InvalidKey("unusable RSA private key".to_string()))?;

    let mut output = vec![0u8; key.min_output_size()];
    let plaintext = key
        .decrypt(algorithm, encrypted_key, &mut output, None)
        .map_err(|_| EncryptionError::Decryption)?;
    Ok(plaintext.to_vec())
}
