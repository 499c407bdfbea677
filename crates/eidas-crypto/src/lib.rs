//! # eidas-crypto
//!
//! Cryptographic primitives for the eIDAS node using aws-lc-rs.
//!
//! ## Contents
//!
//! - Message digests and constant time comparison ([`hash`])
//! - XML-DSig signature algorithms: RSA PKCS#1 v1.5, RSA-PSS and ECDSA ([`signature`])
//! - PEM and X.509 certificate handling ([`pem`], [`certificate`])
//! - XML-Enc primitives: AES-GCM, RSA-OAEP key transport, ECDH-ES key
//!   agreement with ConcatKDF, AES key wrap ([`encryption`])
//! - Secure random identifiers ([`random`])
//!
//! ## NIST 800-53 Rev5 Controls
//!
//! - SC-12: Cryptographic key management
//! - SC-13: Cryptographic protection

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod certificate;
pub mod encryption;
pub mod hash;
pub mod pem;
pub mod random;
pub mod signature;

pub use algorithm::{AlgorithmError, DigestAlgorithm, SignatureAlgorithm};
pub use certificate::{Certificate, KeyType};
pub use hash::{constant_time_eq, digest, sha256, sha384, sha512};
pub use signature::{SignatureError, SigningKey};
