//! ECDH-ES key agreement with ConcatKDF (NIST SP 800-56A).
//!
//! The sender generates an ephemeral key pair on the recipient's curve,
//! agrees a shared secret with the recipient's static public key, derives a
//! key encryption key with ConcatKDF and wraps the content key with AES-KW.
//! The ephemeral public key travels as the originator key of the
//! `xenc:AgreementMethod`.

use aws_lc_rs::agreement::{
    self, ECDH_P256, ECDH_P384, ECDH_P521, EphemeralPrivateKey, PrivateKey, UnparsedPublicKey,
};
use aws_lc_rs::rand::SystemRandom;

use super::EncryptionError;
use super::key_wrap::{self, KeyWrapAlgorithm};
use crate::algorithm::DigestAlgorithm;
use crate::certificate::{Certificate, EcCurve, KeyType};
use crate::hash::digest_parts;

/// ConcatKDF parameters.
///
/// The byte fields hold the decoded values; on the wire XML Enc 1.1 writes
/// them as hex with a leading `00` padding octet (see [`to_kdf_hex`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatKdfParams {
    /// Digest used by the KDF.
    pub digest: DigestAlgorithm,
    /// AlgorithmID.
    pub algorithm_id: Vec<u8>,
    /// PartyUInfo.
    pub party_u_info: Vec<u8>,
    /// PartyVInfo.
    pub party_v_info: Vec<u8>,
}

impl Default for ConcatKdfParams {
    fn default() -> Self {
        Self {
            digest: DigestAlgorithm::Sha256,
            algorithm_id: Vec::new(),
            party_u_info: Vec::new(),
            party_v_info: Vec::new(),
        }
    }
}

/// Derives `key_len` bytes from the shared secret `z`.
///
/// `K(i) = H(counter_i || Z || AlgorithmID || PartyUInfo || PartyVInfo)`
#[must_use]
pub fn concat_kdf(z: &[u8], key_len: usize, params: &ConcatKdfParams) -> Vec<u8> {
    let hash_len = params.digest.output_len();
    let reps = key_len.div_ceil(hash_len);
    let mut derived = Vec::with_capacity(reps * hash_len);

    for counter in 1..=reps {
        let counter = u32::try_from(counter).unwrap_or(u32::MAX).to_be_bytes();
        derived.extend_from_slice(&digest_parts(
            params.digest,
            &[
                &counter,
                z,
                &params.algorithm_id,
                &params.party_u_info,
                &params.party_v_info,
            ],
        ));
    }

    derived.truncate(key_len);
    derived
}

/// Encodes a KDF parameter as XML Enc 1.1 hex with the padding octet.
#[must_use]
pub fn to_kdf_hex(value: &[u8]) -> String {
    let mut hex = String::from("00");
    for b in value {
        hex.push_str(&format!("{b:02X}"));
    }
    hex
}

/// Decodes an XML Enc 1.1 hex KDF parameter, dropping the padding octet.
pub fn from_kdf_hex(hex: &str) -> Result<Vec<u8>, EncryptionError> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err(EncryptionError::InvalidKey("odd length KDF parameter".to_string()));
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| EncryptionError::InvalidKey("invalid hex KDF parameter".to_string()))?;
    Ok(bytes.into_iter().skip(1).collect())
}

fn curve_algorithm(curve: EcCurve) -> &'static agreement::Algorithm {
    match curve {
        EcCurve::P256 => &ECDH_P256,
        EcCurve::P384 => &ECDH_P384,
        EcCurve::P521 => &ECDH_P521,
    }
}

/// Output of the sender side of ECDH-ES.
#[derive(Debug, Clone)]
pub struct AgreedKey {
    /// Uncompressed ephemeral public point.
    pub originator_public_key: Vec<u8>,
    /// Content key wrapped under the derived key encryption key.
    pub wrapped_key: Vec<u8>,
}

/// Wraps `cek` for the EC key of `recipient`.
pub fn encrypt_key(
    recipient: &Certificate,
    wrap: KeyWrapAlgorithm,
    params: &ConcatKdfParams,
    cek: &[u8],
) -> Result<AgreedKey, EncryptionError> {
    let KeyType::Ec(curve) = recipient.key_type() else {
        return Err(EncryptionError::InvalidKey(
            "key agreement requires an EC certificate".to_string(),
        ));
    };
    let alg = curve_algorithm(curve);
    let rng = SystemRandom::new();

    let ephemeral = EphemeralPrivateKey::generate(alg, &rng)
        .map_err(|_| EncryptionError::InvalidKey("ephemeral key generation failed".to_string()))?;
    let originator_public_key = ephemeral
        .compute_public_key()
        .map_err(|_| EncryptionError::Encryption)?
        .as_ref()
        .to_vec();

    let peer = UnparsedPublicKey::new(alg, recipient.public_key_bytes());
    let kek = agreement::agree_ephemeral(ephemeral, &peer, EncryptionError::Encryption, |z| {
        Ok(concat_kdf(z, wrap.kek_len(), params))
    })?;

    Ok(AgreedKey {
        originator_public_key,
        wrapped_key: key_wrap::wrap(wrap, &kek, cek)?,
    })
}

/// Recovers a content key with the recipient's static private key.
pub fn decrypt_key(
    private_key_der: &[u8],
    curve: EcCurve,
    originator_public_key: &[u8],
    wrap: KeyWrapAlgorithm,
    params: &ConcatKdfParams,
    wrapped_key: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let alg = curve_algorithm(curve);
    let private_key = PrivateKey::from_private_key_der(alg, private_key_der)
        .map_err(|e| EncryptionError::InvalidKey(format!("invalid EC private key: {e}")))?;

    let peer = UnparsedPublicKey::new(alg, originator_public_key);
    let kek = agreement::agree(&private_key, &peer, EncryptionError::Decryption, |z| {
        Ok(concat_kdf(z, wrap.kek_len(), params))
    })?;

    key_wrap::unwrap(wrap, &kek, wrapped_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pem::pem_to_der;

    const EC_CERT: &str = include_str!("../../../../testdata/ec-cert.pem");
    const EC_KEY: &str = include_str!("../../../../testdata/ec-key.pem");
    const RSA_CERT: &str = include_str!("../../../../testdata/proxy-cert.pem");

    #[test]
    fn ecdh_es_round_trip() {
        let cert = Certificate::from_pem(EC_CERT).unwrap();
        let key = pem_to_der(EC_KEY).unwrap();
        let params = ConcatKdfParams {
            algorithm_id: b"eidas".to_vec(),
            ..ConcatKdfParams::default()
        };
        let cek = [9u8; 32];

        let agreed = encrypt_key(&cert, KeyWrapAlgorithm::Aes256, &params, &cek).unwrap();
        assert_eq!(agreed.originator_public_key.len(), 65);
        assert_eq!(agreed.wrapped_key.len(), 40);

        let recovered = decrypt_key(
            &key,
            EcCurve::P256,
            &agreed.originator_public_key,
            KeyWrapAlgorithm::Aes256,
            &params,
            &agreed.wrapped_key,
        )
        .unwrap();
        assert_eq!(recovered, cek);
    }

    #[test]
    fn kdf_parameters_must_match() {
        let cert = Certificate::from_pem(EC_CERT).unwrap();
        let key = pem_to_der(EC_KEY).unwrap();
        let agreed =
            encrypt_key(&cert, KeyWrapAlgorithm::Aes128, &ConcatKdfParams::default(), &[1u8; 16])
                .unwrap();
        let other = ConcatKdfParams {
            party_u_info: vec![1, 2, 3],
            ..ConcatKdfParams::default()
        };
        assert!(
            decrypt_key(
                &key,
                EcCurve::P256,
                &agreed.originator_public_key,
                KeyWrapAlgorithm::Aes128,
                &other,
                &agreed.wrapped_key,
            )
            .is_err()
        );
    }

    #[test]
    fn concat_kdf_lengths() {
        let params = ConcatKdfParams::default();
        assert_eq!(concat_kdf(b"secret", 16, &params).len(), 16);
        assert_eq!(concat_kdf(b"secret", 48, &params).len(), 48);
        assert_eq!(
            concat_kdf(b"secret", 16, &params),
            concat_kdf(b"secret", 32, &params)[..16].to_vec()
        );
    }

    #[test]
    fn kdf_hex_encoding() {
        assert_eq!(to_kdf_hex(&[0xAB, 0x01]), "00AB01");
        assert_eq!(from_kdf_hex("00AB01").unwrap(), vec![0xAB, 0x01]);
        assert_eq!(from_kdf_hex("00").unwrap(), Vec::<u8>::new());
        assert!(from_kdf_hex("0").is_err());
    }

    #[test]
    fn rsa_recipient_is_rejected() {
        let cert = Certificate::from_pem(RSA_CERT).unwrap();
        assert!(
            encrypt_key(&cert, KeyWrapAlgorithm::Aes256, &ConcatKdfParams::default(), &[0; 16])
                .is_err()
        );
    }
}
