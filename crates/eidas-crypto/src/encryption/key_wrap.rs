//! AES key wrap (RFC 3394).

use aws_lc_rs::key_wrap::{AES_128, AES_256, AesKek, KeyWrap};

use super::{EncryptionError, KW_AES128, KW_AES256};

/// Key wrap algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyWrapAlgorithm {
    /// AES-128 key wrap.
    Aes128,
    /// AES-256 key wrap.
    Aes256,
}

impl KeyWrapAlgorithm {
    /// Returns the algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Aes128 => KW_AES128,
            Self::Aes256 => KW_AES256,
        }
    }

    /// Parses an algorithm URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri.trim() {
            KW_AES128 => Some(Self::Aes128),
            KW_AES256 => Some(Self::Aes256),
            _ => None,
        }
    }

    /// Returns the key encryption key length in bytes.
    #[must_use]
    pub const fn kek_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }

    fn kek(self, kek: &[u8]) -> Result<AesKek, EncryptionError> {
        let cipher = match self {
            Self::Aes128 => &AES_128,
            Self::Aes256 => &AES_256,
        };
        AesKek::new(cipher, kek)
            .map_err(|_| EncryptionError::InvalidKey("invalid key encryption key".to_string()))
    }
}

/// Wraps `key` under `kek`.
pub fn wrap(algorithm: KeyWrapAlgorithm, kek: &[u8], key: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let mut output = vec![0u8; key.len() + 8];
    let wrapped = algorithm
        .kek(kek)?
        .wrap(key, &mut output)
        .map_err(|_| EncryptionError::Encryption)?;
    Ok(wrapped.to_vec())
}

/// Unwraps `wrapped` under `kek`.
pub fn unwrap(
    algorithm: KeyWrapAlgorithm,
    kek: &[u8],
    wrapped: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    if wrapped.len() < 24 || wrapped.len() % 8 != 0 {
        return Err(EncryptionError::Decryption);
    }
    let mut output = vec![0u8; wrapped.len()];
    let key = algorithm
        .kek(kek)?
        .unwrap(wrapped, &mut output)
        .map_err(|_| EncryptionError::Decryption)?;
    Ok(key.to_vec())
}
