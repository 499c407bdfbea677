//! HTTP-Redirect binding.
//!
//! The message is DEFLATE-compressed, base64-encoded and URL-encoded into the
//! query string. Signed messages carry `SigAlg` and a detached `Signature`
//! computed over `SAMLRequest|SAMLResponse`, `RelayState` and `SigAlg` in
//! that order, exactly as they appear URL-encoded in the query.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};
use tracing::warn;

use crate::error::{SamlError, SamlResult};
use crate::signature::XmlSigner;

use super::{DecodedMessage, SamlMessageType};

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes an unsigned SAML request into a URL.
    pub fn encode_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        Self::encode(xml, destination, relay_state, SamlMessageType::Request)
    }

    /// Encodes an unsigned SAML response into a URL.
    pub fn encode_response(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        Self::encode(xml, destination, relay_state, SamlMessageType::Response)
    }

    fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SamlResult<String> {
        let query = Self::message_query(xml, relay_state, message_type)?;
        Ok(format!("{destination}{}{query}", separator(destination)))
    }

    /// Encodes a SAML message into a URL carrying a detached signature made
    /// with `signer`.
    pub fn encode_signed(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
        signer: &XmlSigner,
    ) -> SamlResult<String> {
        let mut query = Self::message_query(xml, relay_state, message_type)?;
        query.push_str("&SigAlg=");
        query.push_str(&urlencoding::encode(signer.algorithm().uri()));

        let signature = signer.sign_redirect_binding(&query)?;
        query.push_str("&Signature=");
        query.push_str(&urlencoding::encode(&signature));

        Ok(format!("{destination}{}{query}", separator(destination)))
    }

    fn message_query(
        xml: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SamlResult<String> {
        let encoded = STANDARD.encode(deflate_compress(xml.as_bytes())?);
        let mut query = format!("{}={}", message_type.form_param(), urlencoding::encode(&encoded));
        if let Some(rs) = relay_state {
            query.push_str("&RelayState=");
            query.push_str(&urlencoding::encode(rs));
        }
        Ok(query)
    }

    /// Decodes a SAML message from already URL-decoded query parameters.
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
        signature: Option<&str>,
        sig_alg: Option<&str>,
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

        let compressed = STANDARD.decode(encoded.trim())?;
        let xml = String::from_utf8(deflate_decompress(&compressed)?)
            .map_err(|e| SamlError::InvalidRequest(format!("Invalid UTF-8 in message: {e}")))?;

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(String::from),
            signature: signature.map(String::from),
            sig_alg: sig_alg.map(String::from),
            signed_query: None,
        })
    }

    /// Decodes a message from a full URL, keeping the signed part of the
    /// query for detached signature validation.
    ///
    /// The message, `RelayState` and `SigAlg` are read from the same raw
    /// parameters that form the signed string. A query repeating any SAML
    /// parameter is rejected.
    pub fn decode_url(url: &str) -> SamlResult<DecodedMessage> {
        let params = RedirectParams::from_url(url)?;

        let mut decoded = Self::decode(
            pair_value(params.saml_request.as_deref()).as_deref(),
            pair_value(params.saml_response.as_deref()).as_deref(),
            pair_value(params.relay_state.as_deref()).as_deref(),
            pair_value(params.signature.as_deref()).as_deref(),
            pair_value(params.sig_alg.as_deref()).as_deref(),
        )?;
        if decoded.signature.is_some() {
            decoded.signed_query = Some(params.signed_query()?);
        }
        Ok(decoded)
    }

    /// Rebuilds the signed octet string from the raw query of `url`.
    ///
    /// Values are taken as received, without re-encoding, and ordered as
    /// `SAMLRequest|SAMLResponse`, `RelayState`, `SigAlg`.
    pub fn extract_signed_query(url: &str) -> SamlResult<String> {
        RedirectParams::from_url(url)?.signed_query()
    }
}

/// SAML parameters of a Redirect query, each kept as the raw `name=value`
/// pair it was received as.
#[derive(Debug, Default)]
struct RedirectParams {
    saml_request: Option<String>,
    saml_response: Option<String>,
    relay_state: Option<String>,
    sig_alg: Option<String>,
    signature: Option<String>,
}

impl RedirectParams {
    fn from_url(url: &str) -> SamlResult<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| SamlError::InvalidRequest(format!("Invalid URL: {e}")))?;
        let query = parsed
            .query()
            .ok_or_else(|| SamlError::InvalidRequest("No SAML parameters found".to_string()))?;
        Self::parse(query)
    }

    fn parse(query: &str) -> SamlResult<Self> {
        let mut params = Self::default();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let Some((name, _)) = url::form_urlencoded::parse(pair.as_bytes()).next() else {
                continue;
            };
            let slot = match name.as_ref() {
                "SAMLRequest" => &mut params.saml_request,
                "SAMLResponse" => &mut params.saml_response,
                "RelayState" => &mut params.relay_state,
                "SigAlg" => &mut params.sig_alg,
                "Signature" => &mut params.signature,
                _ => continue,
            };
            if slot.replace(pair.to_string()).is_some() {
                warn!(parameter = %name, "redirect query repeats a SAML parameter");
                return Err(SamlError::InvalidRequest(format!("Duplicate {name} parameter")));
            }
        }
        if params.saml_request.is_some() && params.saml_response.is_some() {
            return Err(SamlError::InvalidRequest(
                "Both SAMLRequest and SAMLResponse parameters".to_string(),
            ));
        }
        Ok(params)
    }

    fn signed_query(&self) -> SamlResult<String> {
        let message = self
            .saml_request
            .as_ref()
            .or(self.saml_response.as_ref())
            .ok_or_else(|| SamlError::InvalidRequest("No SAML parameters found".to_string()))?;
        let parts: Vec<&str> = std::iter::once(message)
            .chain(self.relay_state.as_ref())
            .chain(self.sig_alg.as_ref())
            .map(String::as_str)
            .collect();
        Ok(parts.join("&"))
    }
}

/// URL-decoded value of a raw `name=value` pair.
fn pair_value(pair: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(pair?.as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
}

fn separator(destination: &str) -> char {
    if destination.contains('?') { '&' } else { '?' }
}

/// Compresses data using raw DEFLATE (no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Deflate(format!("Compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Deflate(format!("Compression finish error: {e}")))
}

fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SamlError::Deflate(format!("Decompression error: {e}")))?;
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::XmlSignatureValidator;
    use eidas_crypto::Certificate;

    const KEY: &str = include_str!("../../../../testdata/connector-key.pem");
    const CERT: &str = include_str!("../../../../testdata/connector-cert.pem");

    #[test]
    fn encode_and_decode_request() {
        let xml = r#"<saml2p:AuthnRequest>test content here</saml2p:AuthnRequest>"#;
        let url = HttpRedirectBinding::encode_request(xml, "https://proxy.example.eu/sso", Some("state 123"))
            .unwrap();

        assert!(url.starts_with("https://proxy.example.eu/sso?SAMLRequest="));
        assert!(url.contains("RelayState=state%20123"));

        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        assert_eq!(decoded.xml, xml);
        assert_eq!(decoded.message_type, SamlMessageType::Request);
        assert_eq!(decoded.relay_state.as_deref(), Some("state 123"));
        assert!(decoded.signed_query.is_none());
    }

    #[test]
    fn encode_and_decode_response() {
        let xml = r#"<saml2p:Response>test response</saml2p:Response>"#;
        let url = HttpRedirectBinding::encode_response(xml, "https://connector.example.eu/acs", None).unwrap();

        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        assert_eq!(decoded.xml, xml);
        assert_eq!(decoded.message_type, SamlMessageType::Response);
    }

    #[test]
    fn signed_url_validates() {
        let signer = XmlSigner::from_pem(KEY, CERT).unwrap();
        let url = HttpRedirectBinding::encode_signed(
            "<saml2p:AuthnRequest/>",
            "https://proxy.example.eu/sso",
            Some("rs"),
            SamlMessageType::Request,
            &signer,
        )
        .unwrap();

        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        let validator = XmlSignatureValidator::new(vec![Certificate::from_pem(CERT).unwrap()]);
        let signed_query = decoded.signed_query.unwrap();
        assert!(signed_query.starts_with("SAMLRequest="));
        assert!(
            validator
                .validate_redirect_binding(
                    &signed_query,
                    decoded.sig_alg.as_deref().unwrap(),
                    decoded.signature.as_deref().unwrap(),
                )
                .is_ok()
        );

        let tampered = url.replace("RelayState=rs", "RelayState=rt");
        let decoded = HttpRedirectBinding::decode_url(&tampered).unwrap();
        assert!(
            validator
                .validate_redirect_binding(
                    &decoded.signed_query.unwrap(),
                    decoded.sig_alg.as_deref().unwrap(),
                    decoded.signature.as_deref().unwrap(),
                )
                .is_err()
        );
    }

    #[test]
    fn deflate_roundtrip() {
        let original = b"Test data for compression";
        let compressed = deflate_compress(original).unwrap();
        assert_eq!(deflate_decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn extract_signed_query_uses_canonical_order() {
        let url = "https://proxy.example.eu/sso?SigAlg=alg%3A1&Signature=sig&RelayState=xyz&SAMLRequest=abc%2B";
        let query = HttpRedirectBinding::extract_signed_query(url).unwrap();
        assert_eq!(query, "SAMLRequest=abc%2B&RelayState=xyz&SigAlg=alg%3A1");
    }

    fn signed_url(relay_state: Option<&str>) -> String {
        let signer = XmlSigner::from_pem(KEY, CERT).unwrap();
        HttpRedirectBinding::encode_signed(
            "<saml2p:AuthnRequest ID=\"_signed\"/>",
            "https://proxy.example.eu/sso",
            relay_state,
            SamlMessageType::Request,
            &signer,
        )
        .unwrap()
    }

    #[test]
    fn appended_message_is_rejected() {
        let forged = HttpRedirectBinding::message_query(
            "<saml2p:AuthnRequest ID=\"_forged\"/>",
            None,
            SamlMessageType::Request,
        )
        .unwrap();
        let url = format!("{}&{forged}", signed_url(Some("rs")));

        let err = HttpRedirectBinding::decode_url(&url).unwrap_err();
        assert!(matches!(err, SamlError::InvalidRequest(msg) if msg.contains("SAMLRequest")));
        assert!(HttpRedirectBinding::extract_signed_query(&url).is_err());
    }

    #[test]
    fn percent_encoded_duplicate_name_is_rejected() {
        let url = format!("{}&SAML%52equest=abc", signed_url(None));
        assert!(HttpRedirectBinding::decode_url(&url).is_err());
    }

    #[test]
    fn duplicate_sig_alg_is_rejected() {
        let url = format!(
            "{}&SigAlg={}",
            signed_url(Some("rs")),
            urlencoding::encode("http://www.w3.org/2001/04/xmldsig-more#rsa-sha512")
        );
        let err = HttpRedirectBinding::decode_url(&url).unwrap_err();
        assert!(matches!(err, SamlError::InvalidRequest(msg) if msg.contains("SigAlg")));
    }

    #[test]
    fn request_and_response_together_are_rejected() {
        let url = format!("{}&SAMLResponse=abc", signed_url(None));
        assert!(HttpRedirectBinding::decode_url(&url).is_err());
    }

    #[test]
    fn altered_sig_alg_fails_validation() {
        let url = signed_url(Some("rs"));
        let original = urlencoding::encode(XmlSigner::from_pem(KEY, CERT).unwrap().algorithm().uri()).into_owned();
        let altered = url.replace(
            &original,
            &urlencoding::encode("http://www.w3.org/2001/04/xmldsig-more#rsa-sha512"),
        );
        assert_ne!(altered, url);

        let decoded = HttpRedirectBinding::decode_url(&altered).unwrap();
        let validator = XmlSignatureValidator::new(vec![Certificate::from_pem(CERT).unwrap()]);
        assert!(
            validator
                .validate_redirect_binding(
                    &decoded.signed_query.unwrap(),
                    decoded.sig_alg.as_deref().unwrap(),
                    decoded.signature.as_deref().unwrap(),
                )
                .is_err()
        );
    }

    #[test]
    fn decoded_values_match_signed_pairs() {
        let url = signed_url(Some("state 1"));
        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        let signed_query = decoded.signed_query.unwrap();

        assert!(signed_query.contains("&RelayState=state%201&"));
        assert_eq!(decoded.relay_state.as_deref(), Some("state 1"));
        assert!(signed_query.ends_with(&format!("SigAlg={}", urlencoding::encode(decoded.sig_alg.as_deref().unwrap()))));
        assert!(decoded.xml.contains("_signed"));
    }

    #[test]
    fn url_with_existing_query() {
        let url = HttpRedirectBinding::encode_request("<Test/>", "https://proxy.example.eu/sso?existing=param", None)
            .unwrap();
        assert!(url.contains("?existing=param&SAMLRequest="));
    }
}
