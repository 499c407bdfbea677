//! eIDAS protocol engine.
//!
//! [`ProtocolEngine`] ties marshalling, signing, encryption and validation
//! together for the four message exchanges of a node:
//!
//! - connector side: [`generate_request`](ProtocolEngine::generate_request)
//!   and [`process_response`](ProtocolEngine::process_response)
//! - proxy service side: [`process_request`](ProtocolEngine::process_request)
//!   and [`generate_response`](ProtocolEngine::generate_response)
//!
//! Messages are always signed on the parsed form of the marshalled document,
//! so the digest covers exactly what a receiver parses.
//!
//! ## NIST 800-53 Rev5 Controls
//!
//! - IA-2: Identification and authentication
//! - SC-8: Transmission confidentiality and integrity
//! - SC-13: Cryptographic protection

use chrono::{Duration, Utc};
use eidas_core::attribute::ImmutableAttributeMap;
use eidas_core::config::SamlConfig;
use eidas_crypto::algorithm::parse_signature_whitelist;
use eidas_crypto::{Certificate, SignatureAlgorithm};
use tracing::{info, warn};

use crate::bindings::{self, EncodedMessage, HttpPostBinding, HttpRedirectBinding, SamlMessageType};
use crate::encryption::{AssertionDecrypter, AssertionEncrypter, EncryptionConfiguration};
use crate::error::{SamlError, SamlResult};
use crate::loa::EidasRequestedAuthContextValidator;
use crate::signature::{XmlSignatureValidator, XmlSigner};
use crate::types::{
    Assertion, AttributeStatement, AuthnStatement, Conditions, EidasAuthnRequest, EidasResponse, NameId,
    NameIdFormat, SamlBinding, Status, Subject, SubjectConfirmation, SubjectConfirmationData,
};
use crate::validation::{RequestValidator, RequesterMetadata, ResponseValidator};
use crate::xml::{self, Element, marshal, unmarshal};

/// Identity and policy of the node running the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Entity id (metadata URL) written as issuer.
    pub entity_id: String,
    /// Country code of the node.
    pub country: String,
    /// Endpoint receiving requests; checked against the request destination.
    pub service_url: Option<String>,
    /// Tolerated clock difference.
    pub clock_skew: Duration,
    /// Validity of generated assertions and of accepted requests.
    pub assertion_validity: Duration,
    /// Accepted signature algorithms.
    pub signature_whitelist: Vec<SignatureAlgorithm>,
    /// Reject signing certificates outside their validity period.
    pub check_validity_period: bool,
    /// Reject self-signed signing certificates.
    pub disallow_self_signed: bool,
}

impl EngineSettings {
    /// Creates settings with a one minute clock skew and five minute
    /// assertion validity.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            country: country.into(),
            service_url: None,
            clock_skew: Duration::seconds(60),
            assertion_validity: Duration::seconds(300),
            signature_whitelist: SignatureAlgorithm::ALL.to_vec(),
            check_validity_period: true,
            disallow_self_signed: false,
        }
    }

    /// Builds settings from the node's SAML configuration.
    pub fn from_saml_config(entity_id: impl Into<String>, config: &SamlConfig) -> SamlResult<Self> {
        let whitelist = parse_signature_whitelist(&config.signature_algorithm_whitelist)
            .map_err(|e| SamlError::SignatureAlgorithmNotAllowed(e.to_string()))?;
        Ok(Self {
            clock_skew: Duration::seconds(i64::try_from(config.clock_skew_secs).unwrap_or(i64::MAX)),
            assertion_validity: Duration::seconds(
                i64::try_from(config.assertion_validity_secs).unwrap_or(i64::MAX),
            ),
            signature_whitelist: if whitelist.is_empty() {
                SignatureAlgorithm::ALL.to_vec()
            } else {
                whitelist
            },
            check_validity_period: config.check_validity_period,
            disallow_self_signed: config.disallow_self_signed,
            ..Self::new(entity_id, config.country.clone())
        })
    }

    /// Sets the endpoint receiving requests.
    #[must_use]
    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = Some(url.into());
        self
    }
}

/// Outcome of the citizen's authentication, turned into an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    /// Name identifier of the citizen.
    pub subject: String,
    /// Name identifier format; defaults to the requested policy.
    pub subject_name_id_format: Option<NameIdFormat>,
    /// Level of assurance reached.
    pub level_of_assurance: String,
    /// Released attributes.
    pub attributes: ImmutableAttributeMap,
    /// IP address of the citizen's user agent.
    pub ip_address: Option<String>,
}

/// SAML protocol engine of a node.
#[derive(Debug)]
pub struct ProtocolEngine {
    settings: EngineSettings,
    signer: XmlSigner,
    encrypter: AssertionEncrypter,
    decrypter: AssertionDecrypter,
}

impl ProtocolEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(settings: EngineSettings, signer: XmlSigner, encryption: EncryptionConfiguration) -> Self {
        Self {
            settings,
            signer,
            encrypter: AssertionEncrypter::new(encryption.clone()),
            decrypter: AssertionDecrypter::new(encryption),
        }
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the signer.
    #[must_use]
    pub const fn signer(&self) -> &XmlSigner {
        &self.signer
    }

    /// Returns the encryption configuration.
    #[must_use]
    pub const fn encryption(&self) -> &EncryptionConfiguration {
        self.encrypter.config()
    }

    fn signature_validator(&self, trusted_signers: &[Certificate]) -> XmlSignatureValidator {
        XmlSignatureValidator::new(trusted_signers.to_vec())
            .with_whitelist(self.settings.signature_whitelist.clone())
            .with_validity_check(self.settings.check_validity_period)
            .with_self_signed_disallowed(self.settings.disallow_self_signed)
    }

    /// Signs the parsed form of `element` and returns the parsed, signed tree.
    fn sign(&self, element: &Element) -> SamlResult<Element> {
        let mut parsed = xml::parse(&element.to_document())?;
        self.signer.sign_element(&mut parsed)?;
        Ok(parsed)
    }

    /// Validates, signs and encodes a request for `binding`.
    ///
    /// HTTP-Redirect requests carry a detached signature instead of an
    /// enveloped one.
    pub fn generate_request(
        &self,
        request: &EidasAuthnRequest,
        binding: SamlBinding,
    ) -> SamlResult<EncodedMessage> {
        if request.issuer.trim().is_empty() {
            return Err(SamlError::MissingElement("AuthnRequest/Issuer".to_string()));
        }
        let destination = request
            .destination
            .as_deref()
            .ok_or_else(|| SamlError::MissingElement("AuthnRequest/@Destination".to_string()))?;
        EidasRequestedAuthContextValidator::validate(request.requested_authn_context.as_ref())?;

        let element = marshal::authn_request_to_element(request);
        let encoded = match binding {
            SamlBinding::HttpPost => {
                let xml = self.sign(&element)?.to_document();
                EncodedMessage {
                    binding,
                    encoded: HttpPostBinding::encode_value(&xml),
                    xml,
                }
            }
            SamlBinding::HttpRedirect => {
                let xml = element.to_document();
                EncodedMessage {
                    binding,
                    encoded: HttpRedirectBinding::encode_signed(
                        &xml,
                        destination,
                        request.relay_state.as_deref(),
                        SamlMessageType::Request,
                        &self.signer,
                    )?,
                    xml,
                }
            }
        };
        info!(id = %request.id, destination, binding = binding.uri(), "request generated");
        Ok(encoded)
    }

    /// Decodes, verifies and validates a request received over `binding`.
    ///
    /// The origin country is taken from the signing certificate, the citizen
    /// country is this node's country.
    pub fn process_request(
        &self,
        encoded: &str,
        binding: SamlBinding,
        trusted_signers: &[Certificate],
        metadata: Option<&RequesterMetadata>,
    ) -> SamlResult<EidasAuthnRequest> {
        let decoded = bindings::decode(binding, encoded, SamlMessageType::Request)?;
        let root = xml::parse(&decoded.xml)?;
        let validator = self.signature_validator(trusted_signers);

        let signer = match (&decoded.signed_query, &decoded.sig_alg, &decoded.signature) {
            (Some(query), Some(sig_alg), Some(signature)) => {
                validator.validate_redirect_binding(query, sig_alg, signature)?
            }
            _ => {
                let id = root.attr("ID").unwrap_or_default();
                if root.count_id(id) != 1 {
                    return Err(SamlError::SignatureInvalid(format!("ID '{id}' is not unique")));
                }
                validator.validate_element(&root)?
            }
        };

        let mut request = unmarshal::authn_request_from_element(&root)?;
        request.relay_state = decoded.relay_state;
        request.origin_country_code = signer.country().map(str::to_string);
        request.citizen_country_code = Some(self.settings.country.clone());

        let mut request_validator =
            RequestValidator::new(self.settings.clock_skew, self.settings.assertion_validity);
        if let Some(url) = &self.settings.service_url {
            request_validator = request_validator.with_expected_destination(url.clone());
        }
        let sp_type = request_validator.validate(&request, metadata, Utc::now())?;
        request.sp_type = Some(sp_type);

        info!(id = %request.id, issuer = %request.issuer, origin = ?request.origin_country_code, "request accepted");
        Ok(request)
    }

    /// Builds, encrypts and signs the response to `request` for an
    /// authenticated citizen.
    ///
    /// The assertion is encrypted for `encryption_certificate`, or the first
    /// configured encryption certificate. Without either the assertion is
    /// sent in clear unless encryption is mandatory.
    pub fn generate_response(
        &self,
        result: &AuthenticationResult,
        request: &EidasAuthnRequest,
        encryption_certificate: Option<&Certificate>,
    ) -> SamlResult<EncodedMessage> {
        let acs = request.assertion_consumer_service_url.as_deref().ok_or_else(|| {
            SamlError::MissingElement("AuthnRequest/@AssertionConsumerServiceURL".to_string())
        })?;
        let assertion = self.build_assertion(result, request, acs)?;
        let signed_assertion = self.sign(&marshal::assertion_to_element(&assertion))?;

        let recipient = encryption_certificate.or_else(|| self.encryption().encryption_certificates.first());
        let response = EidasResponse::success(&self.settings.entity_id)
            .in_response_to(&request.id)
            .with_destination(acs);
        let mut root = marshal::response_envelope(&response);
        match recipient {
            Some(certificate) => {
                let encrypted = self.encrypter.encrypt(&signed_assertion, certificate)?;
                root.push_child(marshal::encrypted_assertion_to_element(&encrypted));
            }
            None if self.encryption().response_encryption_mandatory => {
                warn!(request = %request.id, "no encryption certificate for the requester");
                return Err(SamlError::UnencryptedResponse);
            }
            None => root.push_child(signed_assertion),
        }

        let xml = self.sign(&root)?.to_document();
        info!(id = %response.id, in_response_to = %request.id, destination = acs, "response generated");
        Ok(EncodedMessage {
            binding: SamlBinding::HttpPost,
            encoded: HttpPostBinding::encode_value(&xml),
            xml,
        })
    }

    /// Builds the signed failure response to `request` carrying `status`.
    pub fn generate_error_response(
        &self,
        request: &EidasAuthnRequest,
        status: Status,
    ) -> SamlResult<EncodedMessage> {
        let mut response =
            EidasResponse::with_status(&self.settings.entity_id, status).in_response_to(&request.id);
        if let Some(acs) = &request.assertion_consumer_service_url {
            response = response.with_destination(acs);
        }
        let xml = self.sign(&marshal::response_envelope(&response))?.to_document();
        info!(id = %response.id, in_response_to = %request.id, status = %response.status.status_code.value, "error response generated");
        Ok(EncodedMessage {
            binding: SamlBinding::HttpPost,
            encoded: HttpPostBinding::encode_value(&xml),
            xml,
        })
    }

    fn build_assertion(
        &self,
        result: &AuthenticationResult,
        request: &EidasAuthnRequest,
        acs: &str,
    ) -> SamlResult<Assertion> {
        let validity = self.settings.assertion_validity;
        let format = result
            .subject_name_id_format
            .or_else(|| request.name_id_policy.as_ref().and_then(|p| p.parsed_format()))
            .unwrap_or(NameIdFormat::Persistent);

        let mut confirmation = SubjectConfirmationData::for_request(&request.id, acs, validity);
        confirmation.address.clone_from(&result.ip_address);

        let mut statement = AuthnStatement::new(&result.level_of_assurance);
        statement.subject_locality_address.clone_from(&result.ip_address);

        Ok(Assertion::new(&self.settings.entity_id)
            .with_subject(
                Subject::new(NameId::new(&result.subject).with_format(format))
                    .with_confirmation(SubjectConfirmation::bearer(confirmation)),
            )
            .with_conditions(Conditions::with_validity(validity).with_audience(&request.issuer))
            .with_authn_statement(statement)
            .with_attribute_statement(AttributeStatement::from_attribute_map(&result.attributes)?))
    }

    /// Decodes, verifies, decrypts and validates a response to
    /// `stored_request` received over HTTP-POST.
    ///
    /// The returned response holds the decrypted assertions in
    /// [`EidasResponse::assertions`].
    pub fn process_response(
        &self,
        encoded: &str,
        trusted_signers: &[Certificate],
        stored_request: &EidasAuthnRequest,
    ) -> SamlResult<EidasResponse> {
        let decoded = bindings::decode(SamlBinding::HttpPost, encoded, SamlMessageType::Response)?;
        let validator = self.signature_validator(trusted_signers);
        let root = validator.validate(&decoded.xml)?;

        let mut response = unmarshal::response_from_element(&root)?;
        response.relay_state = decoded.relay_state;

        let assertions = if response.is_success() {
            self.verified_assertions(&root, &response, &validator)?
        } else {
            Vec::new()
        };

        ResponseValidator::new(self.settings.clock_skew).validate(
            &response,
            &assertions,
            stored_request,
            Utc::now(),
        )?;

        response.assertions = assertions;
        response.encrypted_assertions.clear();
        info!(id = %response.id, in_response_to = %stored_request.id, success = response.is_success(), "response accepted");
        Ok(response)
    }

    fn verified_assertions(
        &self,
        root: &Element,
        response: &EidasResponse,
        validator: &XmlSignatureValidator,
    ) -> SamlResult<Vec<Assertion>> {
        let plain: Vec<&Element> = root.children_named("Assertion").collect();
        if !plain.is_empty() && self.decrypter.config().response_encryption_mandatory {
            return Err(SamlError::UnencryptedResponse);
        }

        let decrypted = if plain.is_empty() {
            self.decrypter.decrypt_all(&response.encrypted_assertions)?
        } else {
            Vec::new()
        };

        plain
            .into_iter()
            .chain(decrypted.iter())
            .map(|element| {
                if element.child("Signature").is_some() {
                    validator.validate_element(element)?;
                }
                unmarshal::assertion_from_element(element)
            })
            .collect()
    }
}
