//! XML Signature creation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use eidas_crypto::{Certificate, SignatureAlgorithm, SigningKey, digest};
use tracing::{debug, warn};

use super::{ENVELOPED_SIGNATURE, EXCLUSIVE_C14N, SignatureConfig, remove_signature, signed_content};
use crate::error::{SamlError, SamlResult};
use crate::types::XMLDSIG_NS;
use crate::xml::dom::{self, Element};
use crate::xml::prefix::DS;
use crate::xml::qname;

fn ds(local: &str) -> Element {
    Element::new(qname(DS, local))
}

/// XML document signer holding the node's signing credential.
pub struct XmlSigner {
    key: SigningKey,
    certificate: Certificate,
    config: SignatureConfig,
}

impl std::fmt::Debug for XmlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlSigner")
            .field("certificate", &self.certificate.subject())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl XmlSigner {
    /// Creates a signer; the algorithm defaults to one the key supports.
    #[must_use]
    pub fn new(key: SigningKey, certificate: Certificate) -> Self {
        let algorithm = if key.supports(SignatureConfig::default().algorithm) {
            SignatureConfig::default().algorithm
        } else {
            key.default_algorithm()
        };
        Self {
            key,
            certificate,
            config: SignatureConfig::with_algorithm(algorithm),
        }
    }

    /// Creates a signer from a PEM private key and its PEM certificate.
    pub fn from_pem(private_key_pem: &str, certificate_pem: &str) -> SamlResult<Self> {
        let certificate = Certificate::from_pem(certificate_pem)?;
        let key = SigningKey::from_pem(private_key_pem, &certificate)?;
        Ok(Self::new(key, certificate))
    }

    /// Selects the signature algorithm.
    ///
    /// An algorithm the key cannot produce is replaced by the key's default.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.config.algorithm = if self.key.supports(algorithm) {
            algorithm
        } else {
            let fallback = self.key.default_algorithm();
            warn!(
                configured = algorithm.uri(),
                used = fallback.uri(),
                "signature algorithm does not fit the signing key"
            );
            fallback
        };
        self
    }

    /// Sets whether the certificate is embedded in `KeyInfo`.
    #[must_use]
    pub const fn with_certificate_included(mut self, include: bool) -> Self {
        self.config.include_certificate = include;
        self
    }

    /// Returns the signature algorithm in use.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.config.algorithm
    }

    /// Returns the signing certificate.
    #[must_use]
    pub const fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Signs the element with ID `reference_id` in `xml` and returns the
    /// signed document.
    pub fn sign(&self, xml: &str, reference_id: &str) -> SamlResult<String> {
        let mut root = dom::parse(xml)?;
        let element = root.find_by_id_mut(reference_id).ok_or_else(|| {
            SamlError::SignatureCreation(format!("element with ID '{reference_id}' not found"))
        })?;
        self.sign_element(element)?;
        Ok(root.to_document())
    }

    /// Inserts an enveloped signature into `element`, after its `Issuer`.
    ///
    /// A previous signature child is replaced. The element must come from a
    /// parsed document so that the digest matches what a receiver computes.
    pub fn sign_element(&self, element: &mut Element) -> SamlResult<()> {
        let id = element
            .attr("ID")
            .ok_or_else(|| SamlError::SignatureCreation("element has no ID".to_string()))?
            .to_string();
        remove_signature(element);

        let algorithm = self.config.algorithm;
        let digest_algorithm = algorithm.digest_algorithm();
        let digest_value = STANDARD.encode(digest(digest_algorithm, signed_content(element).as_bytes()));

        let signed_info = ds("SignedInfo")
            .with_attr(format!("xmlns:{DS}"), XMLDSIG_NS)
            .with_child(ds("CanonicalizationMethod").with_attr("Algorithm", EXCLUSIVE_C14N))
            .with_child(ds("SignatureMethod").with_attr("Algorithm", algorithm.uri()))
            .with_child(
                ds("Reference")
                    .with_attr("URI", format!("#{id}"))
                    .with_child(
                        ds("Transforms")
                            .with_child(ds("Transform").with_attr("Algorithm", ENVELOPED_SIGNATURE))
                            .with_child(ds("Transform").with_attr("Algorithm", EXCLUSIVE_C14N)),
                    )
                    .with_child(ds("DigestMethod").with_attr("Algorithm", digest_algorithm.uri()))
                    .with_child(ds("DigestValue").with_text(digest_value)),
            );

        let signature_value = self
            .key
            .sign(algorithm, signed_info.to_canonical_string().as_bytes())
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;

        let mut signature = ds("Signature")
            .with_attr(format!("xmlns:{DS}"), XMLDSIG_NS)
            .with_child(signed_info)
            .with_child(ds("SignatureValue").with_text(STANDARD.encode(signature_value)));
        if self.config.include_certificate {
            signature.push_child(ds("KeyInfo").with_child(
                ds("X509Data").with_child(ds("X509Certificate").with_text(self.certificate.to_base64())),
            ));
        }

        let position = element.position_of("Issuer").map_or(0, |i| i + 1);
        element.insert_child(position, signature);
        debug!(id = %id, algorithm = algorithm.uri(), "element signed");
        Ok(())
    }

    /// Signs the HTTP-Redirect signing input and returns the base64 value of
    /// the `Signature` parameter.
    pub fn sign_redirect_binding(&self, signing_input: &str) -> SamlResult<String> {
        let signature = self
            .key
            .sign(self.config.algorithm, signing_input.as_bytes())
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;
        Ok(STANDARD.encode(signature))
    }
}
