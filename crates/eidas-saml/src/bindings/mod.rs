//! SAML bindings.
//!
//! - **HTTP-POST**: messages are base64-encoded and posted by an
//!   auto-submitting HTML form
//! - **HTTP-Redirect**: messages are deflated, base64-encoded and carried in
//!   the query string, with a detached signature over the query parameters
//!
//! # Usage
//!
//! ```rust,ignore
//! use eidas_saml::bindings::{HttpPostBinding, HttpRedirectBinding};
//!
//! let html = HttpPostBinding::encode_request(&request_xml, "https://proxy.example.eu/ColleagueRequest", None);
//! let url = HttpRedirectBinding::encode_signed(&request_xml, destination, None, SamlMessageType::Request, &signer)?;
//! ```

mod post;
mod redirect;

pub use post::*;
pub use redirect::*;

use crate::error::{SamlError, SamlResult};
use crate::types::SamlBinding;

/// SAML message type for binding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// AuthnRequest message.
    Request,
    /// Response message.
    Response,
}

impl SamlMessageType {
    /// Returns the form parameter name for this message type.
    #[must_use]
    pub const fn form_param(&self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }
}

/// Decoded SAML binding message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The decoded XML message.
    pub xml: String,
    /// The message type (request or response).
    pub message_type: SamlMessageType,
    /// The RelayState if present.
    pub relay_state: Option<String>,
    /// The detached signature (redirect binding).
    pub signature: Option<String>,
    /// The detached signature algorithm (redirect binding).
    pub sig_alg: Option<String>,
    /// The query parameters covered by the detached signature, as received.
    pub signed_query: Option<String>,
}

/// A message encoded for a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    /// The binding the message is encoded for.
    pub binding: SamlBinding,
    /// The signed XML document.
    pub xml: String,
    /// The base64 form value (POST) or the complete URL (Redirect).
    pub encoded: String,
}

/// Decodes `encoded` as received over `binding`.
///
/// For HTTP-POST `encoded` is the base64 form value, for HTTP-Redirect the
/// complete request URL.
pub fn decode(
    binding: SamlBinding,
    encoded: &str,
    message_type: SamlMessageType,
) -> SamlResult<DecodedMessage> {
    let decoded = match binding {
        SamlBinding::HttpPost => match message_type {
            SamlMessageType::Request => HttpPostBinding::decode(Some(encoded), None, None)?,
            SamlMessageType::Response => HttpPostBinding::decode(None, Some(encoded), None)?,
        },
        SamlBinding::HttpRedirect => HttpRedirectBinding::decode_url(encoded)?,
    };
    if decoded.message_type != message_type {
        return Err(SamlError::InvalidRequest(format!(
            "expected {} parameter",
            message_type.form_param()
        )));
    }
    Ok(decoded)
}
