//! HTTP-POST binding.
//!
//! The message travels base64-encoded in a hidden form field of a page that
//! submits itself to the destination.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{SamlError, SamlResult};

use super::{DecodedMessage, SamlMessageType};

/// HTTP-POST binding encoder/decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Encodes a SAML request as an auto-submitting HTML form.
    #[must_use]
    pub fn encode_request(xml: &str, destination: &str, relay_state: Option<&str>) -> String {
        Self::encode(xml, destination, relay_state, SamlMessageType::Request)
    }

    /// Encodes a SAML response as an auto-submitting HTML form.
    #[must_use]
    pub fn encode_response(xml: &str, destination: &str, relay_state: Option<&str>) -> String {
        Self::encode(xml, destination, relay_state, SamlMessageType::Response)
    }

    /// Returns the form field value for `xml`.
    #[must_use]
    pub fn encode_value(xml: &str) -> String {
        STANDARD.encode(xml)
    }

    fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> String {
        let relay_state_input = relay_state
            .map(|rs| {
                format!(
                    r#"<input type="hidden" name="RelayState" value="{}"/>"#,
                    html_escape(rs)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>eIDAS</title>
</head>
<body onload="document.forms[0].submit()">
    <noscript>
        <p>JavaScript is disabled. Click the button below to continue.</p>
    </noscript>
    <form method="post" action="{}">
        <input type="hidden" name="{}" value="{}"/>
        {}
        <noscript>
            <input type="submit" value="Continue"/>
        </noscript>
    </form>
</body>
</html>"#,
            html_escape(destination),
            message_type.form_param(),
            Self::encode_value(xml),
            relay_state_input
        )
    }

    /// Decodes a SAML message from HTTP-POST form data.
    ///
    /// Line breaks and other whitespace inside the base64 value are ignored.
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let (encoded, message_type) = if let Some(req) = saml_request {
            (req, SamlMessageType::Request)
        } else if let Some(resp) = saml_response {
            (resp, SamlMessageType::Response)
        } else {
            return Err(SamlError::InvalidRequest(
                "No SAMLRequest or SAMLResponse parameter".to_string(),
            ));
        };

        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let decoded = STANDARD.decode(compact)?;
        let xml = String::from_utf8(decoded)
            .map_err(|e| SamlError::InvalidRequest(format!("Invalid UTF-8 in message: {e}")))?;

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(String::from),
            signature: None,
            sig_alg: None,
            signed_query: None,
        })
    }
}

/// Escapes HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_value<'a>(html: &'a str, name: &str) -> &'a str {
        let marker = format!("name=\"{name}\" value=\"");
        let start = html.find(&marker).unwrap() + marker.len();
        let end = html[start..].find('"').unwrap();
        &html[start..start + end]
    }

    #[test]
    fn encode_and_decode_request() {
        let xml = r#"<saml2p:AuthnRequest>test</saml2p:AuthnRequest>"#;
        let html = HttpPostBinding::encode_request(xml, "https://proxy.example.eu/ColleagueRequest", Some("state123"));

        assert!(html.contains("https://proxy.example.eu/ColleagueRequest"));
        assert_eq!(form_value(&html, "RelayState"), "state123");

        let decoded =
            HttpPostBinding::decode(Some(form_value(&html, "SAMLRequest")), None, Some("state123")).unwrap();
        assert_eq!(decoded.xml, xml);
        assert_eq!(decoded.message_type, SamlMessageType::Request);
        assert_eq!(decoded.relay_state.as_deref(), Some("state123"));
    }

    #[test]
    fn encode_and_decode_response() {
        let xml = r#"<saml2p:Response>test</saml2p:Response>"#;
        let html = HttpPostBinding::encode_response(xml, "https://connector.example.eu/acs", None);
        assert!(!html.contains("RelayState"));

        let decoded = HttpPostBinding::decode(None, Some(form_value(&html, "SAMLResponse")), None).unwrap();
        assert_eq!(decoded.xml, xml);
        assert_eq!(decoded.message_type, SamlMessageType::Response);
    }

    #[test]
    fn decode_ignores_line_breaks() {
        let value = HttpPostBinding::encode_value("<saml2p:Response>a longer message body</saml2p:Response>");
        let wrapped = format!("{}\r\n{}", &value[..20], &value[20..]);
        let decoded = HttpPostBinding::decode(None, Some(&wrapped), None).unwrap();
        assert!(decoded.xml.starts_with("<saml2p:Response>"));
    }

    #[test]
    fn decode_errors() {
        assert!(HttpPostBinding::decode(None, None, None).is_err());
        assert!(matches!(
            HttpPostBinding::decode(Some("%%%"), None, None),
            Err(SamlError::Base64Decode(_))
        ));
    }

    #[test]
    fn html_escape_special_chars() {
        let escaped = html_escape(r#"<script>alert("xss")</script>"#);
        assert!(!escaped.contains('<'));
        assert!(!escaped.contains('>'));
        assert!(!escaped.contains('"'));
    }
}
