//! LightToken and BinaryLightToken.
//!
//! A token is the string `issuer|id|createdOn|digest` where `digest` is the
//! base64 of `H(id|issuer|createdOn|secret)`. The binary form is the base64
//! of that string and is what travels through the browser.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use eidas_core::config::LightTokenConfig;
use eidas_crypto::{DigestAlgorithm, constant_time_eq, digest};
use uuid::Uuid;

use crate::error::LightTokenError;

/// Maximum size of an encoded token, before and after base64 decoding.
pub const MAX_TOKEN_SIZE: usize = 1024;

const SEPARATOR: char = '|';
const CREATED_ON_FORMAT: &str = "%Y-%m-%d %H:%M:%S %3f";

/// How the token digest is keyed with the shared secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenDigest {
    /// Plain message digest with the secret appended to the input.
    Salted(DigestAlgorithm),
    /// HMAC keyed with the secret.
    Hmac(DigestAlgorithm),
}

impl TokenDigest {
    /// Parses an algorithm name such as `SHA-256` or `HmacSHA512`.
    pub fn from_name(name: &str) -> Result<Self, LightTokenError> {
        let trimmed = name.trim();
        let invalid = || LightTokenError::InvalidAlgorithm(trimmed.to_string());

        match trimmed.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("hmac") => {
                match DigestAlgorithm::from_name(&trimmed[4..]) {
                    Some(DigestAlgorithm::Sha1) | None => Err(invalid()),
                    Some(alg) => Ok(Self::Hmac(alg)),
                }
            }
            _ => DigestAlgorithm::from_name(trimmed)
                .map(Self::Salted)
                .ok_or_else(invalid),
        }
    }

    fn compute(self, content: &str, secret: &str) -> Vec<u8> {
        match self {
            Self::Salted(alg) => digest(alg, format!("{content}{SEPARATOR}{secret}").as_bytes()),
            Self::Hmac(alg) => eidas_crypto::hash::hmac(alg, secret.as_bytes(), content.as_bytes())
                .unwrap_or_default(),
        }
    }
}

/// Correlation token for one light message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightToken {
    id: String,
    issuer: String,
    created_on: DateTime<Utc>,
}

impl LightToken {
    /// Creates a token with a random UUID issued now.
    pub fn new(issuer: impl Into<String>) -> Result<Self, LightTokenError> {
        Self::from_parts(Uuid::new_v4().to_string(), issuer, Utc::now())
    }

    /// Creates a token from its parts. The timestamp is truncated to milliseconds.
    pub fn from_parts(
        id: impl Into<String>,
        issuer: impl Into<String>,
        created_on: DateTime<Utc>,
    ) -> Result<Self, LightTokenError> {
        let id = id.into();
        let issuer = issuer.into();
        if issuer.trim().is_empty() {
            return Err(LightTokenError::BlankIssuer);
        }
        if id.trim().is_empty() {
            return Err(LightTokenError::Parse);
        }
        Ok(Self {
            id,
            issuer,
            created_on: created_on.trunc_subsecs(3),
        })
    }

    /// Returns the token identifier, which is also the cache key.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the creation instant.
    #[must_use]
    pub const fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }

    /// Returns the creation instant in wire format.
    #[must_use]
    pub fn created_on_string(&self) -> String {
        self.created_on.format(CREATED_ON_FORMAT).to_string()
    }

    fn digest_content(&self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.id,
            self.issuer,
            self.created_on_string()
        )
    }
}

impl fmt::Display for LightToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}{SEPARATOR}{}", self.issuer, self.id, self.created_on_string())
    }
}

/// A token together with its base64 encoded wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLightToken {
    token: LightToken,
    encoded: String,
}

impl BinaryLightToken {
    /// Returns the decoded token.
    #[must_use]
    pub const fn token(&self) -> &LightToken {
        &self.token
    }

    /// Returns the base64 wire form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Consumes the value and returns the base64 wire form.
    #[must_use]
    pub fn into_string(self) -> String {
        self.encoded
    }
}

impl fmt::Display for BinaryLightToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Encodes and verifies tokens for one issuer and shared secret.
#[derive(Clone)]
pub struct LightTokenCodec {
    issuer: String,
    secret: String,
    digest: TokenDigest,
}

impl fmt::Debug for LightTokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightTokenCodec")
            .field("issuer", &self.issuer)
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

impl LightTokenCodec {
    /// Creates a codec from configuration.
    pub fn new(config: &LightTokenConfig) -> Result<Self, LightTokenError> {
        if config.issuer.trim().is_empty() {
            return Err(LightTokenError::BlankIssuer);
        }
        if config.secret.trim().is_empty() {
            return Err(LightTokenError::BlankSecret);
        }
        Ok(Self {
            issuer: config.issuer.clone(),
            secret: config.secret.clone(),
            digest: TokenDigest::from_name(&config.algorithm)?,
        })
    }

    /// Returns the configured issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Creates a fresh token for this issuer.
    pub fn create_token(&self) -> Result<LightToken, LightTokenError> {
        LightToken::new(self.issuer.clone())
    }

    /// Encodes `token` as `issuer|id|createdOn|digest`.
    #[must_use]
    pub fn encode(&self, token: &LightToken) -> String {
        let digest = self.digest.compute(&token.digest_content(), &self.secret);
        format!("{token}{SEPARATOR}{}", STANDARD.encode(digest))
    }

    /// Encodes `token` in its base64 binary form.
    #[must_use]
    pub fn encode_binary(&self, token: &LightToken) -> BinaryLightToken {
        BinaryLightToken {
            token: token.clone(),
            encoded: STANDARD.encode(self.encode(token)),
        }
    }

    /// Parses and verifies an encoded token.
    pub fn decode(&self, encoded: &str) -> Result<LightToken, LightTokenError> {
        if encoded.len() > MAX_TOKEN_SIZE {
            return Err(LightTokenError::SizeExceeded(MAX_TOKEN_SIZE));
        }

        let parts: Vec<&str> = encoded.split(SEPARATOR).collect();
        let [issuer, id, created_on, received] = parts.as_slice() else {
            return Err(LightTokenError::Parse);
        };
        if [issuer, id, created_on, received]
            .iter()
            .any(|part| part.trim().is_empty())
        {
            return Err(LightTokenError::Parse);
        }

        let created = NaiveDateTime::parse_from_str(created_on, CREATED_ON_FORMAT)
            .map_err(|_| LightTokenError::CreatedOn)?
            .and_utc();

        let received = STANDARD
            .decode(received.trim())
            .map_err(|_| LightTokenError::Parse)?;
        let content = format!("{id}{SEPARATOR}{issuer}{SEPARATOR}{created_on}");
        let expected = self.digest.compute(&content, &self.secret);
        if !constant_time_eq(&expected, &received) {
            tracing::warn!(token_id = %id, issuer = %issuer, "light token digest mismatch");
            return Err(LightTokenError::Digest);
        }

        LightToken::from_parts(*id, *issuer, created)
    }

    /// Decodes the base64 binary form and verifies the token.
    pub fn decode_binary(&self, binary: &str) -> Result<LightToken, LightTokenError> {
        if binary.len() > MAX_TOKEN_SIZE {
            return Err(LightTokenError::SizeExceeded(MAX_TOKEN_SIZE));
        }
        let decoded = STANDARD
            .decode(binary.trim())
            .map_err(|_| LightTokenError::Parse)?;
        let decoded = String::from_utf8(decoded).map_err(|_| LightTokenError::Parse)?;
        self.decode(&decoded)
    }
}
