//! eIDAS Response types.
//!
//! Response messages sent by a proxy service back to the requesting
//! connector, with plain or encrypted assertions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Assertion, Status};

/// eIDAS SAML Response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EidasResponse {
    /// Unique identifier for this response.
    pub id: String,

    /// The ID of the request this response answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,

    /// Entity ID of the issuing node.
    pub issuer: String,

    /// The URL this response is sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The consent obtained for this response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent: Option<String>,

    /// The status of the response.
    pub status: Status,

    /// Plain assertions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,

    /// Encrypted assertions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub encrypted_assertions: Vec<EncryptedAssertion>,

    /// The RelayState travelling with the message.
    #[serde(skip)]
    pub relay_state: Option<String>,
}

impl EidasResponse {
    /// Creates a new success response.
    #[must_use]
    pub fn success(issuer: impl Into<String>) -> Self {
        Self::with_status(issuer, Status::success())
    }

    /// Creates a new response with the given status.
    #[must_use]
    pub fn with_status(issuer: impl Into<String>, status: Status) -> Self {
        Self {
            id: eidas_crypto::random::generate_saml_id(),
            in_response_to: None,
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: None,
            consent: None,
            status,
            assertions: Vec::new(),
            encrypted_assertions: Vec::new(),
            relay_state: None,
        }
    }

    /// Sets the request ID this response answers.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Adds an assertion.
    #[must_use]
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, state: impl Into<String>) -> Self {
        self.relay_state = Some(state.into());
        self
    }

    /// Returns true if this response indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the first plain assertion.
    #[must_use]
    pub fn first_assertion(&self) -> Option<&Assertion> {
        self.assertions.first()
    }
}

/// `saml2:EncryptedAssertion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedAssertion {
    /// The encrypted data.
    pub encrypted_data: EncryptedData,
}

/// `xenc:EncryptedData` of an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    /// Data encryption algorithm URI.
    pub encryption_method: String,

    /// Encrypted content keys, one per recipient credential.
    pub encrypted_keys: Vec<EncryptedKey>,

    /// Base64 `IV || ciphertext || tag`.
    pub cipher_value: String,
}

/// `xenc:EncryptedKey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKey {
    /// Key transport or key wrap algorithm URI.
    pub encryption_method: String,

    /// OAEP digest method URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest_method: Option<String>,

    /// OAEP mask generation function URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mgf: Option<String>,

    /// Key agreement parameters for EC recipients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_method: Option<AgreementMethod>,

    /// Base64 DER of the recipient certificate, for key transport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_certificate: Option<String>,

    /// Base64 encrypted or wrapped content key.
    pub cipher_value: String,
}

/// `xenc:AgreementMethod`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementMethod {
    /// Agreement algorithm URI.
    pub algorithm: String,

    /// Key derivation method URI.
    pub key_derivation_method: String,

    /// KDF digest method URI.
    pub kdf_digest_method: String,

    /// ConcatKDF AlgorithmID, hex with padding octet.
    pub algorithm_id: String,

    /// ConcatKDF PartyUInfo, hex with padding octet.
    pub party_u_info: String,

    /// ConcatKDF PartyVInfo, hex with padding octet.
    pub party_v_info: String,

    /// Base64 uncompressed ephemeral public point.
    pub originator_public_key: String,

    /// Base64 DER of the recipient certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_certificate: Option<String>,
}
