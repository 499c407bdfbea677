//! Cryptographically secure random number generation.
//!
//! This module provides secure random generation for:
//! - SAML message and assertion identifiers
//! - Content encryption keys and initialisation vectors
//! - Relay state values
//!
//! All functions use the thread-local generator, which is cryptographically
//! secure by default.

use rand::Rng;
use rand::distr::{Alphanumeric, SampleString};

/// Generates a cryptographically secure random byte array.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a random alphanumeric string of `len` characters.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates a SAML identifier.
///
/// SAML IDs are of type `xs:ID` and must not start with a digit, so the
/// identifier is prefixed with an underscore. The random part carries 128 bits
/// of entropy as required by SAML 2.0 core section 1.3.4.
#[must_use]
pub fn generate_saml_id() -> String {
    let hex: String = random_bytes(16).iter().map(|b| format!("{b:02x}")).collect();
    format!("_{hex}")
}

/// Generates a URL-safe base64-encoded random string.
#[must_use]
pub fn random_base64url(byte_len: usize) -> String {
    let bytes = random_bytes(byte_len);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}
