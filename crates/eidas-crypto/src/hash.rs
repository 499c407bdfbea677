//! Hash functions and message authentication codes.

use aws_lc_rs::{constant_time, digest as lc_digest, hmac};

use crate::algorithm::DigestAlgorithm;

fn lc_algorithm(algorithm: DigestAlgorithm) -> &'static lc_digest::Algorithm {
    match algorithm {
        DigestAlgorithm::Sha1 => &lc_digest::SHA1_FOR_LEGACY_USE_ONLY,
        DigestAlgorithm::Sha256 => &lc_digest::SHA256,
        DigestAlgorithm::Sha384 => &lc_digest::SHA384,
        DigestAlgorithm::Sha512 => &lc_digest::SHA512,
    }
}

/// Computes a digest of the input data.
#[must_use]
pub fn digest(algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
    lc_digest::digest(lc_algorithm(algorithm), data)
        .as_ref()
        .to_vec()
}

/// Computes a digest over several input parts without concatenating them.
#[must_use]
pub fn digest_parts(algorithm: DigestAlgorithm, parts: &[&[u8]]) -> Vec<u8> {
    let mut context = lc_digest::Context::new(lc_algorithm(algorithm));
    for part in parts {
        context.update(part);
    }
    context.finish().as_ref().to_vec()
}

/// Computes a SHA-256 hash of the input data.
#[must_use]
pub fn sha256(data: &[u8]) -> Vec<u8> {
    digest(DigestAlgorithm::Sha256, data)
}

/// Computes a SHA-384 hash of the input data.
#[must_use]
pub fn sha384(data: &[u8]) -> Vec<u8> {
    digest(DigestAlgorithm::Sha384, data)
}

/// Computes a SHA-512 hash of the input data.
#[must_use]
pub fn sha512(data: &[u8]) -> Vec<u8> {
    digest(DigestAlgorithm::Sha512, data)
}

/// Computes an HMAC tag with the given digest.
///
/// Returns `None` for SHA-1, which is not accepted for keyed digests.
#[must_use]
pub fn hmac(algorithm: DigestAlgorithm, key: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    let alg = match algorithm {
        DigestAlgorithm::Sha1 => return None,
        DigestAlgorithm::Sha256 => hmac::HMAC_SHA256,
        DigestAlgorithm::Sha384 => hmac::HMAC_SHA384,
        DigestAlgorithm::Sha512 => hmac::HMAC_SHA512,
    };
    let key = hmac::Key::new(alg, key);
    Some(hmac::sign(&key, data).as_ref().to_vec())
}

/// Compares two byte strings in constant time.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    constant_time::verify_slices_are_equal(a, b).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_lengths() {
        assert_eq!(sha256(b"test").len(), 32);
        assert_eq!(sha384(b"test").len(), 48);
        assert_eq!(sha512(b"test").len(), 64);
        assert_eq!(digest(DigestAlgorithm::Sha1, b"test").len(), 20);
    }

    #[test]
    fn sha256_known_answer() {
        let hex: String = sha256(b"abc").iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(
            hex,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn parts_match_concatenation() {
        assert_eq!(
            digest_parts(DigestAlgorithm::Sha256, &[b"hello ", b"world"]),
            sha256(b"hello world")
        );
    }

    #[test]
    fn hmac_depends_on_key() {
        let a = hmac(DigestAlgorithm::Sha256, b"key-a", b"data").unwrap();
        let b = hmac(DigestAlgorithm::Sha256, b"key-b", b"data").unwrap();
        assert_ne!(a, b);
        assert!(hmac(DigestAlgorithm::Sha1, b"key", b"data").is_none());
    }

    #[test]
    fn constant_time_comparison() {
        assert!(constant_time_eq(b"same", b"same"));
        assert!(!constant_time_eq(b"same", b"diff"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
