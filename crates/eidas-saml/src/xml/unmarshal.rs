//! XML elements to typed messages.
//!
//! Elements are matched by local name so any prefix binding is accepted.
//! Unknown elements are skipped.

use super::dom::{Element, local_part};
use super::{SAML_VERSION, parse_bool, parse_instant};
use crate::error::{SamlError, SamlResult};
use crate::types::{
    AgreementMethod, Assertion, Attribute, AttributeStatement, AttributeValueEntry,
    AuthnContextComparison, AuthnStatement, Conditions, EidasAuthnRequest, EidasResponse,
    EncryptedAssertion, EncryptedData, EncryptedKey, NameId, NameIdPolicy, RequestedAttribute,
    RequestedAuthnContext, SpType, Status, StatusCode, Subject, SubjectConfirmation,
    SubjectConfirmationData,
};

/// Looks up an attribute by local name, ignoring its prefix.
fn attr_local<'a>(element: &'a Element, local: &str) -> Option<&'a str> {
    element
        .attributes
        .iter()
        .find(|(k, _)| !k.starts_with("xmlns") && local_part(k) == local)
        .map(|(_, v)| v.as_str())
}

fn required_attr<'a>(element: &'a Element, name: &str) -> SamlResult<&'a str> {
    element
        .attr(name)
        .ok_or_else(|| SamlError::MissingElement(format!("{}@{name}", element.local_name())))
}

fn opt_string(element: &Element, name: &str) -> Option<String> {
    element.attr(name).map(str::to_string)
}

fn check_version(element: &Element) -> SamlResult<()> {
    match element.attr("Version") {
        Some(SAML_VERSION) => Ok(()),
        other => Err(SamlError::XmlParse(format!(
            "unsupported SAML version {other:?} on {}",
            element.local_name()
        ))),
    }
}

fn issuer(element: &Element) -> SamlResult<String> {
    let issuer = element
        .child_text("Issuer")
        .ok_or_else(|| SamlError::MissingElement(format!("{}/Issuer", element.local_name())))?;
    if issuer.is_empty() {
        return Err(SamlError::MissingElement(format!("{}/Issuer", element.local_name())));
    }
    Ok(issuer)
}

/// Unmarshals an authentication request.
pub fn authn_request_from_element(element: &Element) -> SamlResult<EidasAuthnRequest> {
    if element.local_name() != "AuthnRequest" {
        return Err(SamlError::InvalidRequest(format!(
            "expected AuthnRequest, found {}",
            element.local_name()
        )));
    }
    check_version(element)?;

    let id = required_attr(element, "ID")?;
    let mut request = EidasAuthnRequest::with_id(id, issuer(element)?);
    request.issue_instant = parse_instant(required_attr(element, "IssueInstant")?)?;
    request.destination = opt_string(element, "Destination");
    request.assertion_consumer_service_url = opt_string(element, "AssertionConsumerServiceURL");
    request.protocol_binding = opt_string(element, "ProtocolBinding");
    request.provider_name = opt_string(element, "ProviderName");
    request.force_authn = element.attr("ForceAuthn").and_then(parse_bool).unwrap_or(false);
    request.is_passive = element.attr("IsPassive").and_then(parse_bool).unwrap_or(false);

    if let Some(extensions) = element.child("Extensions") {
        if let Some(sp_type) = extensions.child_text("SPType") {
            request.sp_type = Some(
                SpType::parse(&sp_type)
                    .ok_or_else(|| SamlError::InvalidRequest(format!("invalid SPType '{sp_type}'")))?,
            );
        }
        if let Some(attributes) = extensions.child("RequestedAttributes") {
            for attribute in attributes.children_named("RequestedAttribute") {
                request.requested_attributes.push(requested_attribute(attribute)?);
            }
        }
    }

    if let Some(policy) = element.child("NameIDPolicy") {
        request.name_id_policy = Some(NameIdPolicy {
            format: opt_string(policy, "Format"),
            allow_create: policy.attr("AllowCreate").and_then(parse_bool).unwrap_or(false),
        });
    }

    if let Some(context) = element.child("RequestedAuthnContext") {
        let comparison = match context.attr("Comparison") {
            Some(raw) => Some(AuthnContextComparison::parse(raw).ok_or_else(|| {
                SamlError::InvalidRequest(format!("invalid comparison '{raw}'"))
            })?),
            None => None,
        };
        request.requested_authn_context = Some(RequestedAuthnContext {
            comparison,
            authn_context_class_refs: context
                .children_named("AuthnContextClassRef")
                .map(|c| c.text().trim().to_string())
                .collect(),
        });
    }

    request.requester_id = element
        .child("Scoping")
        .and_then(|s| s.child_text("RequesterID"));

    Ok(request)
}

fn requested_attribute(element: &Element) -> SamlResult<RequestedAttribute> {
    Ok(RequestedAttribute {
        name: required_attr(element, "Name")?.to_string(),
        friendly_name: opt_string(element, "FriendlyName"),
        name_format: opt_string(element, "NameFormat").unwrap_or_default(),
        required: element.attr("isRequired").and_then(parse_bool).unwrap_or(false),
        values: element
            .children_named("AttributeValue")
            .map(|v| v.text().trim().to_string())
            .collect(),
    })
}

/// Unmarshals a response with its plain and encrypted assertions.
pub fn response_from_element(element: &Element) -> SamlResult<EidasResponse> {
    if element.local_name() != "Response" {
        return Err(SamlError::InvalidResponse(format!(
            "expected Response, found {}",
            element.local_name()
        )));
    }
    check_version(element)?;

    let status_element = element.required_child("Status")?;
    let mut response = EidasResponse::with_status(issuer(element)?, status(status_element)?);
    response.id = required_attr(element, "ID")?.to_string();
    response.issue_instant = parse_instant(required_attr(element, "IssueInstant")?)?;
    response.in_response_to = opt_string(element, "InResponseTo");
    response.destination = opt_string(element, "Destination");
    response.consent = opt_string(element, "Consent");

    for assertion in element.children_named("Assertion") {
        response.assertions.push(assertion_from_element(assertion)?);
    }
    for encrypted in element.children_named("EncryptedAssertion") {
        response
            .encrypted_assertions
            .push(encrypted_assertion_from_element(encrypted)?);
    }
    Ok(response)
}

fn status(element: &Element) -> SamlResult<Status> {
    Ok(Status {
        status_code: status_code(element.required_child("StatusCode")?)?,
        status_message: element.child_text("StatusMessage"),
    })
}

fn status_code(element: &Element) -> SamlResult<StatusCode> {
    let mut code = StatusCode::new(required_attr(element, "Value")?);
    if let Some(nested) = element.child("StatusCode") {
        code = code.with_sub_status(status_code(nested)?);
    }
    Ok(code)
}

/// Unmarshals an assertion.
pub fn assertion_from_element(element: &Element) -> SamlResult<Assertion> {
    if element.local_name() != "Assertion" {
        return Err(SamlError::InvalidResponse(format!(
            "expected Assertion, found {}",
            element.local_name()
        )));
    }
    check_version(element)?;

    let mut assertion = Assertion::new(issuer(element)?);
    assertion.id = required_attr(element, "ID")?.to_string();
    assertion.issue_instant = parse_instant(required_attr(element, "IssueInstant")?)?;
    assertion.subject = element.child("Subject").map(subject).transpose()?;
    assertion.conditions = element.child("Conditions").map(conditions).transpose()?;
    assertion.authn_statement = element.child("AuthnStatement").map(authn_statement).transpose()?;
    assertion.attribute_statement = element.child("AttributeStatement").map(attribute_statement);
    Ok(assertion)
}

fn opt_instant(element: &Element, name: &str) -> SamlResult<Option<chrono::DateTime<chrono::Utc>>> {
    element.attr(name).map(parse_instant).transpose()
}

fn subject(element: &Element) -> SamlResult<Subject> {
    let name_id_element = element.required_child("NameID")?;
    let mut subject = Subject::new(NameId {
        value: name_id_element.text().trim().to_string(),
        format: opt_string(name_id_element, "Format"),
        name_qualifier: opt_string(name_id_element, "NameQualifier"),
    });
    for confirmation in element.children_named("SubjectConfirmation") {
        let data = confirmation
            .child("SubjectConfirmationData")
            .map(|d| {
                Ok::<_, SamlError>(SubjectConfirmationData {
                    in_response_to: opt_string(d, "InResponseTo"),
                    not_on_or_after: opt_instant(d, "NotOnOrAfter")?,
                    recipient: opt_string(d, "Recipient"),
                    address: opt_string(d, "Address"),
                })
            })
            .transpose()?;
        subject.subject_confirmations.push(SubjectConfirmation {
            method: required_attr(confirmation, "Method")?.to_string(),
            data,
        });
    }
    Ok(subject)
}

fn conditions(element: &Element) -> SamlResult<Conditions> {
    Ok(Conditions {
        not_before: opt_instant(element, "NotBefore")?,
        not_on_or_after: opt_instant(element, "NotOnOrAfter")?,
        audiences: element
            .children_named("AudienceRestriction")
            .flat_map(|r| r.children_named("Audience"))
            .map(|a| a.text().trim().to_string())
            .collect(),
        one_time_use: element.child("OneTimeUse").is_some(),
    })
}

fn authn_statement(element: &Element) -> SamlResult<AuthnStatement> {
    let class_ref = element
        .required_child("AuthnContext")?
        .child_text("AuthnContextClassRef")
        .ok_or_else(|| SamlError::MissingElement("AuthnContext/AuthnContextClassRef".to_string()))?;
    Ok(AuthnStatement {
        authn_instant: parse_instant(required_attr(element, "AuthnInstant")?)?,
        subject_locality_address: element
            .child("SubjectLocality")
            .and_then(|l| opt_string(l, "Address")),
        authn_context_class_ref: class_ref,
    })
}

fn attribute_statement(element: &Element) -> AttributeStatement {
    AttributeStatement {
        attributes: element
            .children_named("Attribute")
            .filter_map(|a| {
                Some(Attribute {
                    name: a.attr("Name")?.to_string(),
                    name_format: opt_string(a, "NameFormat").unwrap_or_default(),
                    friendly_name: opt_string(a, "FriendlyName"),
                    values: a
                        .children_named("AttributeValue")
                        .map(|v| AttributeValueEntry {
                            value: v.text().trim().to_string(),
                            latin_script: attr_local(v, "LatinScript")
                                .and_then(parse_bool)
                                .unwrap_or(true),
                        })
                        .collect(),
                })
            })
            .collect(),
    }
}

fn cipher_value(element: &Element) -> SamlResult<String> {
    element
        .required_child("CipherData")?
        .child_text("CipherValue")
        .ok_or_else(|| SamlError::MissingElement("CipherData/CipherValue".to_string()))
}

fn algorithm(element: &Element, local: &str) -> Option<String> {
    element.child(local).and_then(|m| opt_string(m, "Algorithm"))
}

fn x509_certificate(key_info: &Element) -> Option<String> {
    key_info
        .child("X509Data")
        .and_then(|d| d.child_text("X509Certificate"))
}

/// Unmarshals an encrypted assertion.
pub fn encrypted_assertion_from_element(element: &Element) -> SamlResult<EncryptedAssertion> {
    let data = element.required_child("EncryptedData")?;
    let encryption_method = algorithm(data, "EncryptionMethod")
        .ok_or_else(|| SamlError::MissingElement("EncryptedData/EncryptionMethod".to_string()))?;

    let mut encrypted_keys = Vec::new();
    if let Some(key_info) = data.child("KeyInfo") {
        for key in key_info.children_named("EncryptedKey") {
            encrypted_keys.push(encrypted_key(key)?);
        }
    }
    // Keys may also be siblings of the encrypted data.
    for key in element.children_named("EncryptedKey") {
        encrypted_keys.push(encrypted_key(key)?);
    }

    Ok(EncryptedAssertion {
        encrypted_data: EncryptedData {
            encryption_method,
            encrypted_keys,
            cipher_value: cipher_value(data)?,
        },
    })
}

fn encrypted_key(element: &Element) -> SamlResult<EncryptedKey> {
    let method = element.required_child("EncryptionMethod")?;
    let key_info = element.child("KeyInfo");
    Ok(EncryptedKey {
        encryption_method: required_attr(method, "Algorithm")?.to_string(),
        digest_method: algorithm(method, "DigestMethod"),
        mgf: algorithm(method, "MGF"),
        agreement_method: key_info
            .and_then(|k| k.child("AgreementMethod"))
            .map(agreement_method)
            .transpose()?,
        recipient_certificate: key_info.and_then(x509_certificate),
        cipher_value: cipher_value(element)?,
    })
}

fn agreement_method(element: &Element) -> SamlResult<AgreementMethod> {
    let derivation = element.required_child("KeyDerivationMethod")?;
    let params = derivation.required_child("ConcatKDFParams")?;
    let originator_public_key = element
        .required_child("OriginatorKeyInfo")?
        .required_child("KeyValue")?
        .required_child("ECKeyValue")?
        .child_text("PublicKey")
        .ok_or_else(|| SamlError::MissingElement("ECKeyValue/PublicKey".to_string()))?;

    Ok(AgreementMethod {
        algorithm: required_attr(element, "Algorithm")?.to_string(),
        key_derivation_method: required_attr(derivation, "Algorithm")?.to_string(),
        kdf_digest_method: algorithm(params, "DigestMethod")
            .ok_or_else(|| SamlError::MissingElement("ConcatKDFParams/DigestMethod".to_string()))?,
        algorithm_id: opt_string(params, "AlgorithmID").unwrap_or_default(),
        party_u_info: opt_string(params, "PartyUInfo").unwrap_or_default(),
        party_v_info: opt_string(params, "PartyVInfo").unwrap_or_default(),
        originator_public_key,
        recipient_certificate: element.child("RecipientKeyInfo").and_then(x509_certificate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NameIdFormat, SamlBinding};
    use crate::xml::dom::parse;
    use crate::xml::marshal::{authn_request_to_element, response_to_element};
    use chrono::Duration;
    use eidas_crypto::encryption::{AES256_GCM, ECDH_ES, KW_AES256, RSA_OAEP};

    fn reparse(element: &Element) -> Element {
        parse(&element.to_document()).unwrap()
    }

    #[test]
    fn authn_request_survives_the_wire() {
        let request = EidasAuthnRequest::with_id("_abc", "https://connector.example.eu/metadata")
            .with_destination("https://proxy.example.eu/ColleagueRequest")
            .with_acs_url("https://connector.example.eu/ColleagueResponse")
            .with_binding(SamlBinding::HttpPost)
            .with_provider_name("DEMO-SP")
            .with_sp_type(SpType::Private)
            .with_requester_id("urn:sp:demo")
            .with_citizen_country("BE")
            .with_name_id_policy(NameIdPolicy::with_format(NameIdFormat::Transient))
            .with_authn_context(
                RequestedAuthnContext::new(AuthnContextComparison::Exact)
                    .with_class_ref("http://eidas.europa.eu/LoA/high")
                    .with_class_ref("http://service.memberstate.ms/NotNotified/LoA/low"),
            )
            .with_attribute(RequestedAttribute {
                name: "http://eidas.europa.eu/attributes/naturalperson/PersonIdentifier".to_string(),
                friendly_name: Some("PersonIdentifier".to_string()),
                name_format: crate::types::ATTRIBUTE_NAME_FORMAT_URI.to_string(),
                required: true,
                values: vec!["value & more".to_string()],
            });

        let parsed = authn_request_from_element(&reparse(&authn_request_to_element(&request))).unwrap();

        assert_eq!(parsed.id, "_abc");
        assert_eq!(parsed.destination, request.destination);
        assert_eq!(parsed.assertion_consumer_service_url, request.assertion_consumer_service_url);
        assert_eq!(parsed.sp_type, Some(SpType::Private));
        assert_eq!(parsed.requester_id.as_deref(), Some("urn:sp:demo"));
        assert_eq!(parsed.requested_authn_context, request.requested_authn_context);
        assert_eq!(parsed.requested_attributes, request.requested_attributes);
        assert_eq!(parsed.name_id_policy, request.name_id_policy);
        assert!(parsed.force_authn);
        // The citizen country is not carried by the request.
        assert_eq!(parsed.citizen_country_code, None);
    }

    #[test]
    fn request_parse_failures() {
        let missing_issuer = parse(
            r#"<saml2p:AuthnRequest xmlns:saml2p="urn:oasis:names:tc:SAML:2.0:protocol" ID="_1" Version="2.0" IssueInstant="2024-01-01T00:00:00Z"/>"#,
        )
        .unwrap();
        assert!(matches!(
            authn_request_from_element(&missing_issuer),
            Err(SamlError::MissingElement(_))
        ));

        let wrong_root = parse("<Response/>").unwrap();
        assert!(matches!(
            authn_request_from_element(&wrong_root),
            Err(SamlError::InvalidRequest(_))
        ));

        let bad_version = parse(
            r#"<AuthnRequest ID="_1" Version="1.1" IssueInstant="2024-01-01T00:00:00Z"><Issuer>x</Issuer></AuthnRequest>"#,
        )
        .unwrap();
        assert!(authn_request_from_element(&bad_version).is_err());
    }

    #[test]
    fn response_with_assertion_survives_the_wire() {
        let assertion = Assertion::new("https://proxy.example.eu/metadata")
            .with_subject(
                Subject::new(NameId::persistent("BE/CA/123")).with_confirmation(
                    SubjectConfirmation::bearer(SubjectConfirmationData::for_request(
                        "_req",
                        "https://connector.example.eu/ColleagueResponse",
                        Duration::minutes(5),
                    )),
                ),
            )
            .with_conditions(
                Conditions::with_validity(Duration::minutes(5))
                    .with_audience("https://connector.example.eu/metadata"),
            )
            .with_authn_statement(
                AuthnStatement::new("http://eidas.europa.eu/LoA/substantial").with_locality("10.0.0.1"),
            )
            .with_attribute_statement(AttributeStatement {
                attributes: vec![Attribute {
                    name: "http://eidas.europa.eu/attributes/naturalperson/CurrentFamilyName".to_string(),
                    name_format: crate::types::ATTRIBUTE_NAME_FORMAT_URI.to_string(),
                    friendly_name: Some("FamilyName".to_string()),
                    values: vec![
                        AttributeValueEntry { value: "Ωμέγα".to_string(), latin_script: false },
                        AttributeValueEntry { value: "Omega".to_string(), latin_script: true },
                    ],
                }],
            });

        let response = EidasResponse::success("https://proxy.example.eu/metadata")
            .in_response_to("_req")
            .with_destination("https://connector.example.eu/ColleagueResponse")
            .with_assertion(assertion);

        let parsed = response_from_element(&reparse(&response_to_element(&response))).unwrap();
        assert!(parsed.is_success());
        assert_eq!(parsed.in_response_to.as_deref(), Some("_req"));

        let original = response.first_assertion().unwrap();
        let back = parsed.first_assertion().unwrap();
        assert_eq!(back.id, original.id);
        assert_eq!(back.subject.as_ref().unwrap().name_id, original.subject.as_ref().unwrap().name_id);
        assert_eq!(back.attribute_statement, original.attribute_statement);
        assert_eq!(back.level_of_assurance(), Some("http://eidas.europa.eu/LoA/substantial"));
        assert_eq!(
            back.conditions.as_ref().unwrap().audiences,
            vec!["https://connector.example.eu/metadata".to_string()]
        );
        assert!(back.conditions.as_ref().unwrap().one_time_use);
        assert_eq!(
            back.bearer_confirmation().unwrap().data.as_ref().unwrap().recipient.as_deref(),
            Some("https://connector.example.eu/ColleagueResponse")
        );
    }

    #[test]
    fn encrypted_assertion_survives_the_wire() {
        let encrypted = EncryptedAssertion {
            encrypted_data: EncryptedData {
                encryption_method: AES256_GCM.to_string(),
                encrypted_keys: vec![
                    EncryptedKey {
                        encryption_method: RSA_OAEP.to_string(),
                        digest_method: Some("http://www.w3.org/2001/04/xmlenc#sha256".to_string()),
                        mgf: Some("http://www.w3.org/2009/xmlenc11#mgf1sha256".to_string()),
                        agreement_method: None,
                        recipient_certificate: Some("Y2VydA==".to_string()),
                        cipher_value: "a2V5".to_string(),
                    },
                    EncryptedKey {
                        encryption_method: KW_AES256.to_string(),
                        digest_method: None,
                        mgf: None,
                        agreement_method: Some(AgreementMethod {
                            algorithm: ECDH_ES.to_string(),
                            key_derivation_method: eidas_crypto::encryption::CONCAT_KDF.to_string(),
                            kdf_digest_method: "http://www.w3.org/2001/04/xmlenc#sha256".to_string(),
                            algorithm_id: "00aa".to_string(),
                            party_u_info: "00".to_string(),
                            party_v_info: "00".to_string(),
                            originator_public_key: "BPo=".to_string(),
                            recipient_certificate: Some("Y2VydA==".to_string()),
                        }),
                        recipient_certificate: None,
                        cipher_value: "d3JhcHBlZA==".to_string(),
                    },
                ],
                cipher_value: "Y2lwaGVy".to_string(),
            },
        };
        let response = EidasResponse {
            encrypted_assertions: vec![encrypted.clone()],
            ..EidasResponse::success("issuer")
        };
        let parsed = response_from_element(&reparse(&response_to_element(&response))).unwrap();
        assert_eq!(parsed.encrypted_assertions, vec![encrypted]);
        assert!(parsed.assertions.is_empty());
    }
}
