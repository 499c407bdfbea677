//! Typed messages to XML elements.
//!
//! Every element that may carry a signature (`AuthnRequest`, `Response`,
//! `Assertion`) declares the namespaces it uses, so it canonicalizes the
//! same way on its own and embedded in a parent.

use eidas_crypto::encryption::{CONCAT_KDF, TYPE_ELEMENT};

use super::dom::Element;
use super::prefix::{DS, DSIG11, EIDAS, SAML, SAMLP, XENC, XENC11};
use super::{CONSENT_UNSPECIFIED, ENTITY_FORMAT, SAML_VERSION, format_instant, qname};
use crate::types::{
    AgreementMethod, Assertion, AttributeStatement, AuthnStatement, Conditions, EIDAS_NS,
    EidasAuthnRequest, EidasResponse, EncryptedAssertion, EncryptedKey, NameId,
    RequestedAttribute, SAML_NS, SAMLP_NS, Status, StatusCode, Subject, XMLDSIG_NS, XMLDSIG11_NS,
    XMLENC_NS, XMLENC11_NS,
};

fn samlp(local: &str) -> Element {
    Element::new(qname(SAMLP, local))
}

fn saml(local: &str) -> Element {
    Element::new(qname(SAML, local))
}

fn ds(local: &str) -> Element {
    Element::new(qname(DS, local))
}

fn xenc(local: &str) -> Element {
    Element::new(qname(XENC, local))
}

fn xmlns(prefix: &str) -> String {
    format!("xmlns:{prefix}")
}

fn issuer(value: &str) -> Element {
    saml("Issuer").with_attr("Format", ENTITY_FORMAT).with_text(value)
}

/// Marshals an authentication request.
#[must_use]
pub fn authn_request_to_element(request: &EidasAuthnRequest) -> Element {
    let mut root = samlp("AuthnRequest")
        .with_attr(xmlns(SAMLP), SAMLP_NS)
        .with_attr(xmlns(SAML), SAML_NS)
        .with_attr(xmlns(DS), XMLDSIG_NS)
        .with_attr(xmlns(EIDAS), EIDAS_NS)
        .with_attr("ID", request.id.as_str())
        .with_attr("Version", SAML_VERSION)
        .with_attr("IssueInstant", format_instant(&request.issue_instant))
        .with_attr("Consent", CONSENT_UNSPECIFIED)
        .with_attr("ForceAuthn", request.force_authn.to_string())
        .with_attr("IsPassive", request.is_passive.to_string())
        .with_opt_attr("Destination", request.destination.as_deref())
        .with_opt_attr(
            "AssertionConsumerServiceURL",
            request.assertion_consumer_service_url.as_deref(),
        )
        .with_opt_attr("ProtocolBinding", request.protocol_binding.as_deref())
        .with_opt_attr("ProviderName", request.provider_name.as_deref())
        .with_child(issuer(&request.issuer));

    let mut extensions = samlp("Extensions");
    if let Some(sp_type) = request.sp_type {
        extensions.push_child(Element::new(qname(EIDAS, "SPType")).with_text(sp_type.as_str()));
    }
    let mut requested = Element::new(qname(EIDAS, "RequestedAttributes"));
    for attribute in &request.requested_attributes {
        requested.push_child(requested_attribute(attribute));
    }
    extensions.push_child(requested);
    root.push_child(extensions);

    if let Some(policy) = &request.name_id_policy {
        root.push_child(
            samlp("NameIDPolicy")
                .with_opt_attr("Format", policy.format.as_deref())
                .with_attr("AllowCreate", policy.allow_create.to_string()),
        );
    }

    if let Some(context) = &request.requested_authn_context {
        let mut element = samlp("RequestedAuthnContext")
            .with_opt_attr("Comparison", context.comparison.map(|c| c.as_str()));
        for level in &context.authn_context_class_refs {
            element.push_child(saml("AuthnContextClassRef").with_text(level.as_str()));
        }
        root.push_child(element);
    }

    if let Some(requester_id) = &request.requester_id {
        root.push_child(
            samlp("Scoping").with_child(samlp("RequesterID").with_text(requester_id.as_str())),
        );
    }

    root
}

fn requested_attribute(attribute: &RequestedAttribute) -> Element {
    let mut element = Element::new(qname(EIDAS, "RequestedAttribute"))
        .with_attr("Name", attribute.name.as_str())
        .with_attr("NameFormat", attribute.name_format.as_str())
        .with_opt_attr("FriendlyName", attribute.friendly_name.as_deref())
        .with_attr("isRequired", attribute.required.to_string());
    for value in &attribute.values {
        element.push_child(Element::new(qname(EIDAS, "AttributeValue")).with_text(value.as_str()));
    }
    element
}

/// Marshals the response envelope and status, without assertions.
#[must_use]
pub fn response_envelope(response: &EidasResponse) -> Element {
    samlp("Response")
        .with_attr(xmlns(SAMLP), SAMLP_NS)
        .with_attr(xmlns(SAML), SAML_NS)
        .with_attr(xmlns(DS), XMLDSIG_NS)
        .with_attr(xmlns(EIDAS), EIDAS_NS)
        .with_attr("ID", response.id.as_str())
        .with_attr("Version", SAML_VERSION)
        .with_attr("IssueInstant", format_instant(&response.issue_instant))
        .with_opt_attr("InResponseTo", response.in_response_to.as_deref())
        .with_opt_attr("Destination", response.destination.as_deref())
        .with_attr(
            "Consent",
            response.consent.as_deref().unwrap_or(CONSENT_UNSPECIFIED),
        )
        .with_child(issuer(&response.issuer))
        .with_child(status(&response.status))
}

/// Marshals a response with its plain and encrypted assertions.
#[must_use]
pub fn response_to_element(response: &EidasResponse) -> Element {
    let mut root = response_envelope(response);
    for assertion in &response.assertions {
        root.push_child(assertion_to_element(assertion));
    }
    for encrypted in &response.encrypted_assertions {
        root.push_child(encrypted_assertion_to_element(encrypted));
    }
    root
}

fn status(status: &Status) -> Element {
    samlp("Status")
        .with_child(status_code(&status.status_code))
        .with_opt_child(
            status
                .status_message
                .as_deref()
                .map(|m| samlp("StatusMessage").with_text(m)),
        )
}

fn status_code(code: &StatusCode) -> Element {
    samlp("StatusCode")
        .with_attr("Value", code.value.as_str())
        .with_opt_child(code.status_code.as_deref().map(status_code))
}

/// Marshals an assertion.
#[must_use]
pub fn assertion_to_element(assertion: &Assertion) -> Element {
    saml("Assertion")
        .with_attr(xmlns(SAML), SAML_NS)
        .with_attr(xmlns(DS), XMLDSIG_NS)
        .with_attr(xmlns(EIDAS), EIDAS_NS)
        .with_attr("ID", assertion.id.as_str())
        .with_attr("Version", SAML_VERSION)
        .with_attr("IssueInstant", format_instant(&assertion.issue_instant))
        .with_child(issuer(&assertion.issuer))
        .with_opt_child(assertion.subject.as_ref().map(subject))
        .with_opt_child(assertion.conditions.as_ref().map(conditions))
        .with_opt_child(assertion.authn_statement.as_ref().map(authn_statement))
        .with_opt_child(assertion.attribute_statement.as_ref().map(attribute_statement))
}

fn name_id(name_id: &NameId) -> Element {
    saml("NameID")
        .with_opt_attr("Format", name_id.format.as_deref())
        .with_opt_attr("NameQualifier", name_id.name_qualifier.as_deref())
        .with_text(name_id.value.as_str())
}

fn subject(subject: &Subject) -> Element {
    let mut element = saml("Subject").with_child(name_id(&subject.name_id));
    for confirmation in &subject.subject_confirmations {
        let data = confirmation.data.as_ref().map(|d| {
            saml("SubjectConfirmationData")
                .with_opt_attr("Address", d.address.as_deref())
                .with_opt_attr("InResponseTo", d.in_response_to.as_deref())
                .with_opt_attr("NotOnOrAfter", d.not_on_or_after.as_ref().map(format_instant))
                .with_opt_attr("Recipient", d.recipient.as_deref())
        });
        element.push_child(
            saml("SubjectConfirmation")
                .with_attr("Method", confirmation.method.as_str())
                .with_opt_child(data),
        );
    }
    element
}

fn conditions(conditions: &Conditions) -> Element {
    let mut element = saml("Conditions")
        .with_opt_attr("NotBefore", conditions.not_before.as_ref().map(format_instant))
        .with_opt_attr(
            "NotOnOrAfter",
            conditions.not_on_or_after.as_ref().map(format_instant),
        );
    if !conditions.audiences.is_empty() {
        let mut restriction = saml("AudienceRestriction");
        for audience in &conditions.audiences {
            restriction.push_child(saml("Audience").with_text(audience.as_str()));
        }
        element.push_child(restriction);
    }
    if conditions.one_time_use {
        element.push_child(saml("OneTimeUse"));
    }
    element
}

fn authn_statement(statement: &AuthnStatement) -> Element {
    saml("AuthnStatement")
        .with_attr("AuthnInstant", format_instant(&statement.authn_instant))
        .with_opt_child(
            statement
                .subject_locality_address
                .as_deref()
                .map(|a| saml("SubjectLocality").with_attr("Address", a)),
        )
        .with_child(
            saml("AuthnContext").with_child(
                saml("AuthnContextClassRef").with_text(statement.authn_context_class_ref.as_str()),
            ),
        )
}

fn attribute_statement(statement: &AttributeStatement) -> Element {
    let mut element = saml("AttributeStatement");
    for attribute in &statement.attributes {
        let mut attr = saml("Attribute")
            .with_opt_attr("FriendlyName", attribute.friendly_name.as_deref())
            .with_attr("Name", attribute.name.as_str())
            .with_attr("NameFormat", attribute.name_format.as_str());
        for value in &attribute.values {
            let mut v = saml("AttributeValue").with_text(value.value.as_str());
            if !value.latin_script {
                v.set_attr(qname(EIDAS, "LatinScript"), "false");
            }
            attr.push_child(v);
        }
        element.push_child(attr);
    }
    element
}

/// Marshals an encrypted assertion.
#[must_use]
pub fn encrypted_assertion_to_element(encrypted: &EncryptedAssertion) -> Element {
    let data = &encrypted.encrypted_data;
    let mut key_info = ds("KeyInfo");
    for key in &data.encrypted_keys {
        key_info.push_child(encrypted_key(key));
    }

    let encrypted_data = xenc("EncryptedData")
        .with_attr(xmlns(XENC), XMLENC_NS)
        .with_attr(xmlns(XENC11), XMLENC11_NS)
        .with_attr(xmlns(DS), XMLDSIG_NS)
        .with_attr(xmlns(DSIG11), XMLDSIG11_NS)
        .with_attr("Type", TYPE_ELEMENT)
        .with_child(xenc("EncryptionMethod").with_attr("Algorithm", data.encryption_method.as_str()))
        .with_child(key_info)
        .with_child(cipher_data(&data.cipher_value));

    saml("EncryptedAssertion")
        .with_attr(xmlns(SAML), SAML_NS)
        .with_child(encrypted_data)
}

fn cipher_data(value: &str) -> Element {
    xenc("CipherData").with_child(xenc("CipherValue").with_text(value))
}

fn x509_data(certificate: &str) -> Element {
    ds("X509Data").with_child(ds("X509Certificate").with_text(certificate))
}

fn encrypted_key(key: &EncryptedKey) -> Element {
    let method = xenc("EncryptionMethod")
        .with_attr("Algorithm", key.encryption_method.as_str())
        .with_opt_child(
            key.digest_method
                .as_deref()
                .map(|d| ds("DigestMethod").with_attr("Algorithm", d)),
        )
        .with_opt_child(
            key.mgf
                .as_deref()
                .map(|m| Element::new(qname(XENC11, "MGF")).with_attr("Algorithm", m)),
        );

    let mut key_info = ds("KeyInfo");
    if let Some(agreement) = &key.agreement_method {
        key_info.push_child(agreement_method(agreement));
    }
    if let Some(certificate) = &key.recipient_certificate {
        key_info.push_child(x509_data(certificate));
    }

    xenc("EncryptedKey")
        .with_child(method)
        .with_child(key_info)
        .with_child(cipher_data(&key.cipher_value))
}

fn agreement_method(agreement: &AgreementMethod) -> Element {
    let kdf_params = Element::new(qname(XENC11, "ConcatKDFParams"))
        .with_attr("AlgorithmID", agreement.algorithm_id.as_str())
        .with_attr("PartyUInfo", agreement.party_u_info.as_str())
        .with_attr("PartyVInfo", agreement.party_v_info.as_str())
        .with_child(ds("DigestMethod").with_attr("Algorithm", agreement.kdf_digest_method.as_str()));

    let kdf = if agreement.key_derivation_method.is_empty() {
        CONCAT_KDF
    } else {
        agreement.key_derivation_method.as_str()
    };
    let derivation = Element::new(qname(XENC11, "KeyDerivationMethod"))
        .with_attr("Algorithm", kdf)
        .with_child(kdf_params);

    let originator = xenc("OriginatorKeyInfo").with_child(
        ds("KeyValue").with_child(
            Element::new(qname(DSIG11, "ECKeyValue")).with_child(
                Element::new(qname(DSIG11, "PublicKey"))
                    .with_text(agreement.originator_public_key.as_str()),
            ),
        ),
    );

    xenc("AgreementMethod")
        .with_attr("Algorithm", agreement.algorithm.as_str())
        .with_child(derivation)
        .with_child(originator)
        .with_opt_child(
            agreement
                .recipient_certificate
                .as_deref()
                .map(|c| xenc("RecipientKeyInfo").with_child(x509_data(c))),
        )
}
