//! XML Signature validation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use eidas_crypto::certificate::check_certificate_policy;
use eidas_crypto::{Certificate, SignatureAlgorithm, SignatureError, constant_time_eq, digest};
use tracing::{debug, warn};

use super::{XmlSignature, signed_content};
use crate::error::{SamlError, SamlResult};
use crate::xml::dom::{self, Element};

/// Validates enveloped signatures against a set of trusted certificates.
#[derive(Debug, Clone)]
pub struct XmlSignatureValidator {
    trusted: Vec<Certificate>,
    whitelist: Vec<SignatureAlgorithm>,
    check_validity_period: bool,
    disallow_self_signed: bool,
}

impl XmlSignatureValidator {
    /// Creates a validator trusting `trusted`, accepting every supported
    /// algorithm.
    #[must_use]
    pub fn new(trusted: Vec<Certificate>) -> Self {
        Self {
            trusted,
            whitelist: SignatureAlgorithm::ALL.to_vec(),
            check_validity_period: false,
            disallow_self_signed: false,
        }
    }

    /// Restricts the accepted signature algorithms.
    #[must_use]
    pub fn with_whitelist(mut self, whitelist: Vec<SignatureAlgorithm>) -> Self {
        self.whitelist = whitelist;
        self
    }

    /// Rejects certificates outside their validity period.
    #[must_use]
    pub const fn with_validity_check(mut self, check: bool) -> Self {
        self.check_validity_period = check;
        self
    }

    /// Rejects self-signed certificates.
    #[must_use]
    pub const fn with_self_signed_disallowed(mut self, disallow: bool) -> Self {
        self.disallow_self_signed = disallow;
        self
    }

    /// Returns the trusted certificates.
    #[must_use]
    pub fn trusted(&self) -> &[Certificate] {
        &self.trusted
    }

    /// Parses `xml` and validates the signature of its root element.
    ///
    /// The signature must be a direct child of the root and reference the
    /// root's `ID`, which must be unique in the document.
    pub fn validate(&self, xml: &str) -> SamlResult<Element> {
        let root = dom::parse(xml)?;
        let id = root
            .attr("ID")
            .ok_or_else(|| SamlError::SignatureInvalid("signed element has no ID".to_string()))?;
        if root.count_id(id) != 1 {
            return Err(SamlError::SignatureInvalid(format!("ID '{id}' is not unique")));
        }
        self.validate_element(&root)?;
        Ok(root)
    }

    /// Validates the enveloped signature of `element` and returns the
    /// certificate that verified it.
    pub fn validate_element(&self, element: &Element) -> SamlResult<Certificate> {
        let signature = XmlSignature::from_parent(element)?
            .ok_or_else(|| SamlError::SignatureInvalid(format!("{} is not signed", element.local_name())))?;

        let id = element.attr("ID").unwrap_or_default();
        if signature.reference_id != id {
            return Err(SamlError::SignatureInvalid(format!(
                "signature references '{}' instead of '{id}'",
                signature.reference_id
            )));
        }
        self.check_algorithm(signature.algorithm)?;

        let expected = STANDARD
            .decode(&signature.digest_value)
            .map_err(|e| SamlError::SignatureInvalid(format!("invalid digest value: {e}")))?;
        let actual = digest(signature.digest_algorithm, signed_content(element).as_bytes());
        if !constant_time_eq(&expected, &actual) {
            warn!(id = %id, "digest mismatch");
            return Err(SamlError::SignatureInvalid("digest mismatch".to_string()));
        }

        let signature_value = STANDARD
            .decode(&signature.signature_value)
            .map_err(|e| SamlError::SignatureInvalid(format!("invalid signature value: {e}")))?;
        let signed_info = signature.signed_info.to_canonical_string();

        let certificate = self.verify(
            signature.x509_certificate.as_deref(),
            signature.algorithm,
            signed_info.as_bytes(),
            &signature_value,
        )?;
        debug!(id = %id, subject = certificate.subject(), "signature validated");
        Ok(certificate)
    }

    /// Validates an HTTP-Redirect binding signature over `signing_input`.
    pub fn validate_redirect_binding(
        &self,
        signing_input: &str,
        sig_alg: &str,
        signature_b64: &str,
    ) -> SamlResult<Certificate> {
        let algorithm = SignatureAlgorithm::from_uri(sig_alg).ok_or_else(|| {
            SamlError::SignatureAlgorithmNotAllowed(format!("unsupported algorithm '{sig_alg}'"))
        })?;
        self.check_algorithm(algorithm)?;
        let signature = STANDARD
            .decode(signature_b64.trim())
            .map_err(|e| SamlError::SignatureInvalid(format!("invalid signature value: {e}")))?;
        self.verify(None, algorithm, signing_input.as_bytes(), &signature)
    }

    fn check_algorithm(&self, algorithm: SignatureAlgorithm) -> SamlResult<()> {
        if self.whitelist.contains(&algorithm) {
            Ok(())
        } else {
            Err(SamlError::SignatureAlgorithmNotAllowed(algorithm.uri().to_string()))
        }
    }

    fn check_policy(&self, certificate: &Certificate) -> SamlResult<()> {
        check_certificate_policy(
            certificate,
            self.check_validity_period,
            self.disallow_self_signed,
            Utc::now(),
        )
        .map_err(SamlError::from)
    }

    fn verify(
        &self,
        embedded: Option<&str>,
        algorithm: SignatureAlgorithm,
        data: &[u8],
        signature: &[u8],
    ) -> SamlResult<Certificate> {
        let verify_with = |certificate: &Certificate| {
            eidas_crypto::signature::verify(certificate, algorithm, data, signature).map_err(|e| match e {
                SignatureError::InvalidCertificate(msg) => SamlError::InvalidCertificate(msg),
                other => SamlError::SignatureInvalid(other.to_string()),
            })
        };

        if let Some(embedded) = embedded {
            let certificate = Certificate::from_base64(embedded)?;
            if !self.trusted.contains(&certificate) {
                return Err(SamlError::UntrustedCertificate(certificate.subject().to_string()));
            }
            self.check_policy(&certificate)?;
            verify_with(&certificate)?;
            return Ok(certificate);
        }

        let mut last_error = SamlError::UntrustedCertificate("no trusted certificate".to_string());
        for certificate in &self.trusted {
            if let Err(err) = self.check_policy(certificate) {
                last_error = err;
                continue;
            }
            match verify_with(certificate) {
                Ok(()) => return Ok(certificate.clone()),
                Err(err) => last_error = err,
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::XmlSigner;

    const KEY: &str = include_str!("../../../../testdata/connector-key.pem");
    const CERT: &str = include_str!("../../../../testdata/connector-cert.pem");
    const OTHER_CERT: &str = include_str!("../../../../testdata/proxy-cert.pem");
    const EC_KEY: &str = include_str!("../../../../testdata/ec-key.pem");
    const EC_CERT: &str = include_str!("../../../../testdata/ec-cert.pem");

    const DOC: &str = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_resp"><saml:Issuer>issuer</saml:Issuer><saml:Assertion ID="_a"><saml:Issuer>issuer</saml:Issuer><saml:AttributeStatement>value</saml:AttributeStatement></saml:Assertion></samlp:Response>"#;

    fn signer() -> XmlSigner {
        XmlSigner::from_pem(KEY, CERT).unwrap()
    }

    fn validator(cert: &str) -> XmlSignatureValidator {
        XmlSignatureValidator::new(vec![Certificate::from_pem(cert).unwrap()])
    }

    #[test]
    fn valid_signature() {
        let signed = signer().sign(DOC, "_resp").unwrap();
        let root = validator(CERT).validate(&signed).unwrap();
        assert_eq!(root.attr("ID"), Some("_resp"));
    }

    #[test]
    fn ec_signature() {
        let signer = XmlSigner::from_pem(EC_KEY, EC_CERT).unwrap();
        let signed = signer.sign(DOC, "_resp").unwrap();
        assert!(validator(EC_CERT).validate(&signed).is_ok());
    }

    #[test]
    fn tampered_content_is_rejected() {
        let signed = signer().sign(DOC, "_resp").unwrap();
        let tampered = signed.replace(">value<", ">other<");
        assert!(matches!(
            validator(CERT).validate(&tampered),
            Err(SamlError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn injected_foreign_signature_is_rejected() {
        let signed = signer().sign(DOC, "_resp").unwrap();
        let injected = signed.replacen(
            "</ds:Signature>",
            r#"</ds:Signature><x:Signature xmlns:x="urn:x">injected</x:Signature>"#,
            1,
        );
        assert_ne!(injected, signed);
        assert!(matches!(
            validator(CERT).validate(&injected),
            Err(SamlError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn untrusted_certificate_is_rejected() {
        let signed = signer().sign(DOC, "_resp").unwrap();
        assert!(matches!(
            validator(OTHER_CERT).validate(&signed),
            Err(SamlError::UntrustedCertificate(_))
        ));
    }

    #[test]
    fn signature_without_key_info_uses_trusted_certificates() {
        let signed = signer()
            .with_certificate_included(false)
            .sign(DOC, "_resp")
            .unwrap();
        assert!(validator(CERT).validate(&signed).is_ok());
        assert!(validator(OTHER_CERT).validate(&signed).is_err());
    }

    #[test]
    fn algorithm_outside_whitelist_is_rejected() {
        let signed = signer().sign(DOC, "_resp").unwrap();
        let validator = validator(CERT).with_whitelist(vec![SignatureAlgorithm::RsaSha512]);
        assert!(matches!(
            validator.validate(&signed),
            Err(SamlError::SignatureAlgorithmNotAllowed(_))
        ));
    }

    #[test]
    fn self_signed_certificate_policy() {
        let signed = signer().sign(DOC, "_resp").unwrap();
        let validator = validator(CERT).with_self_signed_disallowed(true);
        assert!(matches!(
            validator.validate(&signed),
            Err(SamlError::InvalidCertificate(_))
        ));
    }

    #[test]
    fn signature_of_nested_element_does_not_cover_root() {
        // The root is unsigned; only the assertion carries a signature.
        let signed = signer().sign(DOC, "_a").unwrap();
        assert!(validator(CERT).validate(&signed).is_err());

        let root = dom::parse(&signed).unwrap();
        let assertion = root.child("Assertion").unwrap();
        assert!(validator(CERT).validate_element(assertion).is_ok());
    }

    #[test]
    fn wrapped_reference_is_rejected() {
        // Move the root signature into a document whose root has another ID.
        let signed = signer().sign(DOC, "_resp").unwrap();
        let wrapped = signed.replacen(r#"ID="_resp""#, r#"ID="_evil""#, 1);
        assert!(matches!(
            validator(CERT).validate(&wrapped),
            Err(SamlError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let doc = DOC.replace(r#"ID="_a""#, r#"ID="_resp""#);
        let signed = signer().sign(&doc, "_resp").unwrap();
        assert!(validator(CERT).validate(&signed).is_err());
    }

    #[test]
    fn redirect_binding_signature() {
        let signer = signer();
        let input = "SAMLRequest=abc&RelayState=xyz&SigAlg=alg";
        let signature = signer.sign_redirect_binding(input).unwrap();
        let validator = validator(CERT);
        assert!(
            validator
                .validate_redirect_binding(input, signer.algorithm().uri(), &signature)
                .is_ok()
        );
        assert!(
            validator
                .validate_redirect_binding("SAMLRequest=abd", signer.algorithm().uri(), &signature)
                .is_err()
        );
        assert!(matches!(
            validator.validate_redirect_binding(input, "http://www.w3.org/2000/09/xmldsig#rsa-sha1", &signature),
            Err(SamlError::SignatureAlgorithmNotAllowed(_))
        ));
    }
}
