//! X.509 certificate handling.
//!
//! Certificates are parsed once with `x509-parser`; the fields needed by the
//! signature and encryption engines are copied out so the type owns its data.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::hash::sha256;
use crate::pem::{pem_blocks, pem_to_der};
use crate::signature::SignatureError;

/// Elliptic curves supported for ECDSA and ECDH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    /// NIST P-256.
    P256,
    /// NIST P-384.
    P384,
    /// NIST P-521.
    P521,
}

impl EcCurve {
    /// Determines the curve from the length of an uncompressed point.
    #[must_use]
    pub const fn from_point_len(len: usize) -> Option<Self> {
        match len {
            65 => Some(Self::P256),
            97 => Some(Self::P384),
            133 => Some(Self::P521),
            _ => None,
        }
    }
}

/// Public key type of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// RSA key with its modulus size in bits.
    Rsa {
        /// Modulus size in bits.
        bits: usize,
    },
    /// Elliptic curve key.
    Ec(EcCurve),
}

/// Parsed X.509 certificate.
#[derive(Debug, Clone)]
pub struct Certificate {
    der: Vec<u8>,
    spki: Vec<u8>,
    public_key: Vec<u8>,
    key_type: KeyType,
    subject: String,
    country: Option<String>,
    issuer: String,
    serial: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    self_signed: bool,
}

impl Certificate {
    /// Parses a DER encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, SignatureError> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| SignatureError::InvalidCertificate(format!("invalid X.509: {e}")))?;

        let spki = cert.public_key();
        let key_type = match spki.parsed() {
            Ok(PublicKey::RSA(rsa)) => KeyType::Rsa {
                bits: rsa.key_size(),
            },
            Ok(PublicKey::EC(point)) => {
                let curve = EcCurve::from_point_len(point.data().len()).ok_or_else(|| {
                    SignatureError::InvalidCertificate("unsupported elliptic curve".to_string())
                })?;
                KeyType::Ec(curve)
            }
            Ok(_) => {
                return Err(SignatureError::InvalidCertificate(
                    "unsupported public key type".to_string(),
                ));
            }
            Err(e) => {
                return Err(SignatureError::InvalidCertificate(format!(
                    "invalid public key: {e}"
                )));
            }
        };

        let timestamp = |t: &ASN1Time| {
            DateTime::<Utc>::from_timestamp(t.timestamp(), 0).ok_or_else(|| {
                SignatureError::InvalidCertificate("validity out of range".to_string())
            })
        };

        Ok(Self {
            der: der.to_vec(),
            spki: spki.raw.to_vec(),
            public_key: spki.subject_public_key.data.to_vec(),
            key_type,
            subject: cert.subject().to_string(),
            country: cert
                .subject()
                .iter_country()
                .next()
                .and_then(|c| c.as_str().ok())
                .map(str::to_string),
            issuer: cert.issuer().to_string(),
            serial: cert.tbs_certificate.raw_serial_as_string(),
            not_before: timestamp(&cert.validity().not_before)?,
            not_after: timestamp(&cert.validity().not_after)?,
            self_signed: cert.subject() == cert.issuer(),
        })
    }

    /// Parses the first certificate of a PEM document.
    pub fn from_pem(pem: &str) -> Result<Self, SignatureError> {
        Self::from_der(&pem_to_der(pem)?)
    }

    /// Parses every certificate of a PEM document.
    pub fn all_from_pem(pem: &str) -> Result<Vec<Self>, SignatureError> {
        pem_blocks(pem)?
            .into_iter()
            .filter(|(label, _)| label.is_empty() || label == "CERTIFICATE")
            .map(|(_, der)| Self::from_der(&der))
            .collect()
    }

    /// Parses the base64 content of a `ds:X509Certificate` element.
    pub fn from_base64(value: &str) -> Result<Self, SignatureError> {
        let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        let der = STANDARD
            .decode(cleaned)
            .map_err(|e| SignatureError::InvalidCertificate(format!("invalid base64: {e}")))?;
        Self::from_der(&der)
    }

    /// Returns the DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the base64 DER encoding used in `ds:X509Certificate`.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.der)
    }

    /// Returns the DER encoded `SubjectPublicKeyInfo`.
    #[must_use]
    pub fn spki_der(&self) -> &[u8] {
        &self.spki
    }

    /// Returns the raw public key: `RSAPublicKey` DER or the uncompressed EC point.
    #[must_use]
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key
    }

    /// Returns the key type.
    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Returns the subject distinguished name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the country (`C`) of the subject.
    #[must_use]
    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    /// Returns the issuer distinguished name.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the serial number as colon separated hex.
    #[must_use]
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Returns the start of the validity period.
    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// Returns the end of the validity period.
    #[must_use]
    pub const fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Returns whether `now` falls within the validity period.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Returns whether subject and issuer are the same.
    #[must_use]
    pub const fn is_self_signed(&self) -> bool {
        self.self_signed
    }

    /// Returns the SHA-256 fingerprint of the DER encoding.
    #[must_use]
    pub fn fingerprint(&self) -> Vec<u8> {
        sha256(&self.der)
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

/// Checks a certificate against the validity and self-signed policies.
pub fn check_certificate_policy(
    certificate: &Certificate,
    check_validity_period: bool,
    disallow_self_signed: bool,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    if check_validity_period && !certificate.is_valid_at(now) {
        tracing::warn!(
            subject = certificate.subject(),
            not_after = %certificate.not_after(),
            "certificate outside its validity period"
        );
        return Err(SignatureError::InvalidCertificate(format!(
            "certificate {} is outside its validity period",
            certificate.subject()
        )));
    }
    if disallow_self_signed && certificate.is_self_signed() {
        tracing::warn!(subject = certificate.subject(), "self-signed certificate rejected");
        return Err(SignatureError::InvalidCertificate(format!(
            "self-signed certificate {} is not allowed",
            certificate.subject()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_CERT: &str = include_str!("../../../testdata/connector-cert.pem");
    const EC_CERT: &str = include_str!("../../../testdata/ec-cert.pem");
    const EXPIRED_CERT: &str = include_str!("../../../testdata/expired-cert.pem");
    const ISSUED_CERT: &str = include_str!("../../../testdata/issued-cert.pem");

    #[test]
    fn parses_rsa_certificate() {
        let cert = Certificate::from_pem(RSA_CERT).unwrap();
        assert_eq!(cert.key_type(), KeyType::Rsa { bits: 2048 });
        assert!(cert.subject().contains("connector.example.eu"));
        assert_eq!(cert.country(), Some("EU"));
        assert!(cert.is_self_signed());
        assert!(cert.is_valid_at(Utc::now()));
    }

    #[test]
    fn parses_ec_certificate() {
        let cert = Certificate::from_pem(EC_CERT).unwrap();
        assert_eq!(cert.key_type(), KeyType::Ec(EcCurve::P256));
        assert_eq!(cert.public_key_bytes().len(), 65);
    }

    #[test]
    fn base64_round_trip() {
        let cert = Certificate::from_pem(RSA_CERT).unwrap();
        let again = Certificate::from_base64(&cert.to_base64()).unwrap();
        assert_eq!(cert, again);
        assert_eq!(cert.fingerprint().len(), 32);
    }

    #[test]
    fn expired_certificate_fails_validity_policy() {
        let cert = Certificate::from_pem(EXPIRED_CERT).unwrap();
        assert!(!cert.is_valid_at(Utc::now()));
        assert!(check_certificate_policy(&cert, true, false, Utc::now()).is_err());
        assert!(check_certificate_policy(&cert, false, false, Utc::now()).is_ok());
    }

    #[test]
    fn self_signed_policy() {
        let self_signed = Certificate::from_pem(RSA_CERT).unwrap();
        let issued = Certificate::from_pem(ISSUED_CERT).unwrap();
        assert!(!issued.is_self_signed());
        assert!(check_certificate_policy(&self_signed, true, true, Utc::now()).is_err());
        assert!(check_certificate_policy(&issued, true, true, Utc::now()).is_ok());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Certificate::from_der(&[0x30, 0x00]).is_err());
        assert!(Certificate::from_base64("not base64!").is_err());
    }
}
