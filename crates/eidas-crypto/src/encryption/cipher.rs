//! AES-GCM content encryption.
//!
//! The XML Enc 1.1 GCM cipher value is `IV (12 bytes) || ciphertext || tag (16 bytes)`.

use aws_lc_rs::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};

use super::{DataEncryptionAlgorithm, EncryptionError};
use crate::random::random_bytes;

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

fn key(algorithm: DataEncryptionAlgorithm, key: &[u8]) -> Result<LessSafeKey, EncryptionError> {
    let alg = match algorithm {
        DataEncryptionAlgorithm::Aes128Gcm => &aead::AES_128_GCM,
        DataEncryptionAlgorithm::Aes192Gcm => &aead::AES_192_GCM,
        DataEncryptionAlgorithm::Aes256Gcm => &aead::AES_256_GCM,
    };
    UnboundKey::new(alg, key)
        .map(LessSafeKey::new)
        .map_err(|_| {
            EncryptionError::InvalidKey(format!(
                "{} requires a {} byte key",
                algorithm.uri(),
                algorithm.key_len()
            ))
        })
}

/// Encrypts `plaintext`, returning `IV || ciphertext || tag`.
pub fn encrypt(
    algorithm: DataEncryptionAlgorithm,
    cek: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let key = key(algorithm, cek)?;
    let iv = random_bytes(IV_LEN);
    let nonce = Nonce::try_assume_unique_for_key(&iv).map_err(|_| EncryptionError::Encryption)?;

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| EncryptionError::Encryption)?;

    let mut output = iv;
    output.extend_from_slice(&in_out);
    Ok(output)
}

/// Decrypts `IV || ciphertext || tag`.
pub fn decrypt(
    algorithm: DataEncryptionAlgorithm,
    cek: &[u8],
    cipher_value: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    if cipher_value.len() < IV_LEN + TAG_LEN {
        return Err(EncryptionError::Decryption);
    }
    let key = key(algorithm, cek)?;
    let (iv, sealed) = cipher_value.split_at(IV_LEN);
    let nonce = Nonce::try_assume_unique_for_key(iv).map_err(|_| EncryptionError::Decryption)?;

    let mut in_out = sealed.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| EncryptionError::Decryption)?;
    Ok(plaintext.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcm_layout_and_round_trip() {
        for alg in [
            DataEncryptionAlgorithm::Aes128Gcm,
            DataEncryptionAlgorithm::Aes192Gcm,
            DataEncryptionAlgorithm::Aes256Gcm,
        ] {
            let cek = alg.generate_key();
            let sealed = encrypt(alg, &cek, b"<saml2:Assertion/>").unwrap();
            assert_eq!(sealed.len(), IV_LEN + 18 + TAG_LEN);
            assert_eq!(decrypt(alg, &cek, &sealed).unwrap(), b"<saml2:Assertion/>");
        }
    }

    #[test]
    fn tampering_is_detected() {
        let alg = DataEncryptionAlgorithm::Aes256Gcm;
        let cek = alg.generate_key();
        let mut sealed = encrypt(alg, &cek, b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            decrypt(alg, &cek, &sealed),
            Err(EncryptionError::Decryption)
        ));
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        assert!(matches!(
            encrypt(DataEncryptionAlgorithm::Aes256Gcm, &[0u8; 16], b"x"),
            Err(EncryptionError::InvalidKey(_))
        ));
        assert!(decrypt(DataEncryptionAlgorithm::Aes128Gcm, &[0u8; 16], &[0u8; 8]).is_err());
    }
}
