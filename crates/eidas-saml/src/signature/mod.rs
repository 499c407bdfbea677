//! XML Signature support for eIDAS messages.
//!
//! Enveloped signatures over a single element referenced by its `ID`.
//! The signed element and the `SignedInfo` are digested in the canonical
//! form of [`crate::xml::dom`]; the reference declares the enveloped
//! signature and exclusive canonicalization transforms.
//!
//! Algorithms come from [`eidas_crypto::SignatureAlgorithm`]; SHA-1 based
//! algorithms are not available.
//!
//! ## NIST 800-53 Rev5 Controls
//!
//! - SC-8: Transmission confidentiality and integrity
//! - SI-7: Software, firmware, and information integrity

mod signer;
mod validator;

pub use signer::*;
pub use validator::*;

use eidas_crypto::{DigestAlgorithm, SignatureAlgorithm};

use crate::error::{SamlError, SamlResult};
use crate::types::XMLDSIG_NS;
use crate::xml::dom::{Element, Node};

/// Exclusive XML canonicalization without comments.
pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Enveloped signature transform.
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Parsed `<ds:Signature>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlSignature {
    /// The signature algorithm used.
    pub algorithm: SignatureAlgorithm,
    /// The digest algorithm of the reference.
    pub digest_algorithm: DigestAlgorithm,
    /// The referenced element ID, without `#`.
    pub reference_id: String,
    /// The digest value (base64).
    pub digest_value: String,
    /// The signature value (base64).
    pub signature_value: String,
    /// The embedded signing certificate (base64 DER).
    pub x509_certificate: Option<String>,
    /// The `SignedInfo` element as found.
    pub signed_info: Element,
}

impl XmlSignature {
    /// Reads the signature child of `element`, if any.
    ///
    /// Only the first direct XMLDSig `Signature` child is considered.
    pub fn from_parent(element: &Element) -> SamlResult<Option<Self>> {
        element
            .elements()
            .find(|child| is_signature(child, element))
            .map(Self::from_element)
            .transpose()
    }

    /// Reads a `<ds:Signature>` element.
    pub fn from_element(signature: &Element) -> SamlResult<Self> {
        let signed_info = signature.required_child("SignedInfo")?;

        let method_uri = signed_info
            .required_child("SignatureMethod")?
            .attr("Algorithm")
            .unwrap_or_default();
        let algorithm = SignatureAlgorithm::from_uri(method_uri).ok_or_else(|| {
            SamlError::SignatureAlgorithmNotAllowed(format!("unsupported algorithm '{method_uri}'"))
        })?;

        let references: Vec<&Element> = signed_info.children_named("Reference").collect();
        let [reference] = references.as_slice() else {
            return Err(SamlError::SignatureInvalid(format!(
                "expected exactly one reference, found {}",
                references.len()
            )));
        };

        let digest_uri = reference
            .required_child("DigestMethod")?
            .attr("Algorithm")
            .unwrap_or_default();
        let digest_algorithm = DigestAlgorithm::from_uri(digest_uri)
            .filter(|d| *d != DigestAlgorithm::Sha1)
            .ok_or_else(|| {
                SamlError::SignatureAlgorithmNotAllowed(format!("unsupported digest '{digest_uri}'"))
            })?;

        let reference_id = reference
            .attr("URI")
            .and_then(|uri| uri.strip_prefix('#'))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SamlError::SignatureInvalid("reference must point to an element ID".to_string()))?
            .to_string();

        let digest_value = reference
            .child_text("DigestValue")
            .ok_or_else(|| SamlError::MissingElement("Reference/DigestValue".to_string()))?;
        let signature_value = signature
            .child_text("SignatureValue")
            .ok_or_else(|| SamlError::MissingElement("Signature/SignatureValue".to_string()))?;
        let x509_certificate = signature
            .child("KeyInfo")
            .and_then(|k| k.child("X509Data"))
            .and_then(|d| d.child_text("X509Certificate"))
            .map(|c| c.split_whitespace().collect());

        Ok(Self {
            algorithm,
            digest_algorithm,
            reference_id,
            digest_value: digest_value.split_whitespace().collect(),
            signature_value: signature_value.split_whitespace().collect(),
            x509_certificate,
            signed_info: signed_info.clone(),
        })
    }
}

/// Configuration for signature creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureConfig {
    /// The signature algorithm to use.
    pub algorithm: SignatureAlgorithm,
    /// Whether to include the X.509 certificate in the signature.
    pub include_certificate: bool,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            algorithm: SignatureAlgorithm::RsaPssSha256,
            include_certificate: true,
        }
    }
}

impl SignatureConfig {
    /// Creates a configuration with the given algorithm.
    #[must_use]
    pub const fn with_algorithm(algorithm: SignatureAlgorithm) -> Self {
        Self {
            algorithm,
            include_certificate: true,
        }
    }
}

/// Returns the canonical bytes digested for the element: the element
/// without the signature child [`XmlSignature::from_parent`] reads.
///
/// Any other child, including a second signature, stays in the content.
#[must_use]
pub fn signed_content(element: &Element) -> String {
    let mut content = element.clone();
    remove_signature(&mut content);
    content.to_canonical_string()
}

/// Removes the enveloped signature child; returns whether one was present.
pub(crate) fn remove_signature(element: &mut Element) -> bool {
    let position = element
        .children
        .iter()
        .position(|n| matches!(n, Node::Element(e) if is_signature(e, element)));
    position.map(|index| element.children.remove(index)).is_some()
}

// An undeclared prefix cannot be resolved from here and is taken as XMLDSig.
fn is_signature(candidate: &Element, parent: &Element) -> bool {
    if candidate.local_name() != "Signature" {
        return false;
    }
    let declaration = candidate
        .prefix()
        .map_or_else(|| "xmlns".to_string(), |prefix| format!("xmlns:{prefix}"));
    candidate
        .attr(&declaration)
        .or_else(|| parent.attr(&declaration))
        .is_none_or(|namespace| namespace == XMLDSIG_NS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_config_default() {
        let config = SignatureConfig::default();
        assert_eq!(config.algorithm, SignatureAlgorithm::RsaPssSha256);
        assert!(config.include_certificate);
        assert_eq!(
            SignatureConfig::with_algorithm(SignatureAlgorithm::EcdsaSha256).algorithm,
            SignatureAlgorithm::EcdsaSha256
        );
    }

    #[test]
    fn signed_content_excludes_signature() {
        let element = Element::new("a")
            .with_attr("ID", "_a")
            .with_child(Element::new("ds:Signature").with_text("sig"))
            .with_child(Element::new("b"));
        assert_eq!(signed_content(&element), r#"<a ID="_a"><b></b></a>"#);
    }

    #[test]
    fn signed_content_keeps_foreign_signature() {
        let element = Element::new("a")
            .with_attr("ID", "_a")
            .with_attr("xmlns:ds", XMLDSIG_NS)
            .with_attr("xmlns:x", "urn:x")
            .with_child(Element::new("ds:Signature").with_text("sig"))
            .with_child(Element::new("x:Signature").with_text("injected"));
        assert_eq!(
            signed_content(&element),
            r#"<a xmlns:ds="http://www.w3.org/2000/09/xmldsig#" xmlns:x="urn:x" ID="_a"><x:Signature>injected</x:Signature></a>"#
        );
    }

    #[test]
    fn signed_content_removes_only_the_first_signature() {
        let element = Element::new("a")
            .with_child(Element::new("ds:Signature").with_text("one"))
            .with_child(Element::new("ds:Signature").with_text("two"));
        assert_eq!(signed_content(&element), "<a><ds:Signature>two</ds:Signature></a>");
    }

    #[test]
    fn rejects_sha1_signature_method() {
        let xml = r##"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo>
            <ds:SignatureMethod Algorithm="http://www.w3.org/2000/09/xmldsig#rsa-sha1"/>
            <ds:Reference URI="#_a"><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>
            <ds:DigestValue>AA==</ds:DigestValue></ds:Reference></ds:SignedInfo>
            <ds:SignatureValue>AA==</ds:SignatureValue></ds:Signature>"##;
        let element = crate::xml::parse(xml).unwrap();
        assert!(matches!(
            XmlSignature::from_element(&element),
            Err(SamlError::SignatureAlgorithmNotAllowed(_))
        ));
    }
}
