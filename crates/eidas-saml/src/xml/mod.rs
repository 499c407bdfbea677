//! XML representation of eIDAS messages.
//!
//! [`dom`] holds the element tree and its canonical serialization,
//! [`marshal`] and [`unmarshal`] map the typed messages to and from it.

pub mod dom;
pub mod marshal;
pub mod unmarshal;

use chrono::{DateTime, SecondsFormat, Utc};

pub use dom::{Element, Node, parse};

use crate::error::{SamlError, SamlResult};
use crate::types::{Assertion, EidasAuthnRequest, EidasResponse};

/// Prefixes used when writing messages.
pub mod prefix {
    /// SAML protocol.
    pub const SAMLP: &str = "saml2p";
    /// SAML assertion.
    pub const SAML: &str = "saml2";
    /// XML signature.
    pub const DS: &str = "ds";
    /// XML signature 1.1.
    pub const DSIG11: &str = "dsig11";
    /// eIDAS extensions.
    pub const EIDAS: &str = "eidas";
    /// XML encryption.
    pub const XENC: &str = "xenc";
    /// XML encryption 1.1.
    pub const XENC11: &str = "xenc11";
}

/// SAML version attribute value.
pub const SAML_VERSION: &str = "2.0";

/// Format of entity issuers.
pub const ENTITY_FORMAT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:entity";

/// Consent value written on outgoing messages.
pub const CONSENT_UNSPECIFIED: &str = "urn:oasis:names:tc:SAML:2.0:consent:unspecified";

/// Serializes an authentication request.
#[must_use]
pub fn marshal_request(request: &EidasAuthnRequest) -> String {
    marshal::authn_request_to_element(request).to_document()
}

/// Serializes a response with its assertions.
#[must_use]
pub fn marshal_response(response: &EidasResponse) -> String {
    marshal::response_to_element(response).to_document()
}

/// Serializes a standalone assertion.
#[must_use]
pub fn marshal_assertion(assertion: &Assertion) -> String {
    marshal::assertion_to_element(assertion).to_document()
}

/// Parses an authentication request document.
pub fn unmarshal_request(xml: &str) -> SamlResult<EidasAuthnRequest> {
    unmarshal::authn_request_from_element(&parse(xml)?)
}

/// Parses a response document.
pub fn unmarshal_response(xml: &str) -> SamlResult<EidasResponse> {
    unmarshal::response_from_element(&parse(xml)?)
}

/// Returns `prefix:local`.
#[must_use]
pub fn qname(prefix: &str, local: &str) -> String {
    format!("{prefix}:{local}")
}

/// Formats an instant as `xs:dateTime` in UTC with millisecond precision.
#[must_use]
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an `xs:dateTime` value.
pub fn parse_instant(value: &str) -> SamlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SamlError::XmlParse(format!("invalid dateTime '{value}': {e}")))
}

/// Parses an `xs:boolean` value.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn instants() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 10, 20, 30).unwrap();
        let formatted = format_instant(&instant);
        assert_eq!(formatted, "2024-03-01T10:20:30.000Z");
        assert_eq!(parse_instant(&formatted).unwrap(), instant);
        assert_eq!(parse_instant("2024-03-01T11:20:30+01:00").unwrap(), instant);
        assert!(parse_instant("yesterday").is_err());
    }

    #[test]
    fn booleans() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
