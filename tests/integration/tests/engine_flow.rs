//! Connector to proxy service exchanges through the protocol engines.

use eidas_core::ImmutableAttributeMap;
use eidas_core::attribute::{AttributeValue, eidas_core_registry};
use eidas_saml::encryption::EncryptionConfiguration;
use eidas_saml::loa::NotifiedLevelOfAssurance;
use eidas_saml::signature::XmlSigner;
use eidas_saml::{AuthenticationResult, EngineSettings, ProtocolEngine, SamlBinding, SamlError, SpType};

use crate::common::*;

const PROXY_ID: &str = "https://proxy.example.eu/metadata";
const PROXY_SSO: &str = "https://proxy.example.eu/ColleagueRequest";

fn proxy() -> ProtocolEngine {
    ProtocolEngine::new(
        EngineSettings::new(PROXY_ID, "BE").with_service_url(PROXY_SSO),
        XmlSigner::from_pem(PROXY_KEY, PROXY_CERT).unwrap(),
        EncryptionConfiguration::default(),
    )
}

fn authenticated(subject: &str) -> AuthenticationResult {
    let registry = eidas_core_registry();
    let identifier = registry
        .get_by_name_uri("http://eidas.europa.eu/attributes/naturalperson/PersonIdentifier")
        .unwrap()
        .clone();
    let family_name = registry
        .get_by_name_uri("http://eidas.europa.eu/attributes/naturalperson/CurrentFamilyName")
        .unwrap()
        .clone();
    AuthenticationResult {
        subject: subject.to_string(),
        subject_name_id_format: None,
        level_of_assurance: NotifiedLevelOfAssurance::Substantial.uri().to_string(),
        attributes: ImmutableAttributeMap::builder()
            .put_value(identifier, AttributeValue::string(subject))
            .put_value(family_name, AttributeValue::string("Garcia"))
            .build(),
        ip_address: None,
    }
}

#[tokio::test]
async fn test_rsa_exchange_with_metadata_checks() -> anyhow::Result<()> {
    init_tracing();
    let connector = connector_engine(CONNECTOR_KEY, CONNECTOR_CERT);
    let metadata = connector_metadata(CONNECTOR_CERT);

    let request = authn_request(PROXY_SSO).with_relay_state("relay-1");
    let encoded = connector.generate_request(&request, SamlBinding::HttpRedirect)?;

    let received = proxy().process_request(
        &encoded.encoded,
        SamlBinding::HttpRedirect,
        &metadata.signing_certificates(),
        Some(&metadata.requester_metadata()),
    )?;
    assert_eq!(received.id, request.id);
    assert_eq!(received.relay_state.as_deref(), Some("relay-1"));
    assert_eq!(received.citizen_country_code.as_deref(), Some("BE"));
    assert_eq!(received.origin_country_code.as_deref(), Some("EU"));
    assert_eq!(received.sp_type, Some(SpType::Public));

    let response = proxy().generate_response(
        &authenticated("BE/EU/0123456"),
        &received,
        metadata.encryption_certificate(),
    )?;
    assert!(response.xml.contains("EncryptedAssertion"));

    let processed = connector.process_response(&response.encoded, &[cert(PROXY_CERT)], &request)?;
    assert!(processed.is_success());
    let assertion = processed.first_assertion().expect("assertion");
    let attributes = assertion
        .attribute_statement
        .as_ref()
        .expect("attribute statement")
        .to_attribute_map(&eidas_core_registry())?;
    assert_eq!(attributes.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_ec_exchange() -> anyhow::Result<()> {
    init_tracing();
    let connector = connector_engine(EC_KEY, EC_CERT);
    let metadata = connector_metadata(EC_CERT);

    let request = authn_request(PROXY_SSO);
    let encoded = connector.generate_request(&request, SamlBinding::HttpPost)?;
    let received = proxy().process_request(
        &encoded.encoded,
        SamlBinding::HttpPost,
        &metadata.signing_certificates(),
        Some(&metadata.requester_metadata()),
    )?;

    let response = proxy().generate_response(
        &authenticated("BE/EU/7654321"),
        &received,
        metadata.encryption_certificate(),
    )?;
    assert!(response.xml.contains("EncryptedAssertion"));
    assert!(!response.xml.contains("BE/EU/7654321"));

    let processed = connector.process_response(&response.encoded, &[cert(PROXY_CERT)], &request)?;
    assert_eq!(
        processed.first_assertion().and_then(|a| a.level_of_assurance()),
        Some(NotifiedLevelOfAssurance::Substantial.uri())
    );

    Ok(())
}

#[tokio::test]
async fn test_unregistered_acs_url_is_rejected() -> anyhow::Result<()> {
    let connector = connector_engine(CONNECTOR_KEY, CONNECTOR_CERT);
    let metadata = connector_metadata(CONNECTOR_CERT);

    let request = authn_request(PROXY_SSO).with_acs_url("https://connector.example.eu/elsewhere");
    let encoded = connector.generate_request(&request, SamlBinding::HttpPost)?;
    let err = proxy()
        .process_request(
            &encoded.encoded,
            SamlBinding::HttpPost,
            &metadata.signing_certificates(),
            Some(&metadata.requester_metadata()),
        )
        .unwrap_err();
    assert!(matches!(err, SamlError::InvalidAcsUrl(_)));
    assert_eq!(err.http_status(), 400);

    Ok(())
}

#[tokio::test]
async fn test_sp_type_in_request_and_metadata_is_rejected() -> anyhow::Result<()> {
    let connector = connector_engine(CONNECTOR_KEY, CONNECTOR_CERT);
    let metadata = connector_metadata(CONNECTOR_CERT).with_sp_type(SpType::Private);

    let encoded = connector.generate_request(&authn_request(PROXY_SSO), SamlBinding::HttpPost)?;
    let err = proxy()
        .process_request(
            &encoded.encoded,
            SamlBinding::HttpPost,
            &metadata.signing_certificates(),
            Some(&metadata.requester_metadata()),
        )
        .unwrap_err();
    assert!(matches!(err, SamlError::InconsistentSpType));

    Ok(())
}

#[tokio::test]
async fn test_request_signed_by_other_connector_is_rejected() -> anyhow::Result<()> {
    let impostor = connector_engine(EC_KEY, EC_CERT);
    let metadata = connector_metadata(CONNECTOR_CERT);

    let encoded = impostor.generate_request(&authn_request(PROXY_SSO), SamlBinding::HttpPost)?;
    let err = proxy()
        .process_request(
            &encoded.encoded,
            SamlBinding::HttpPost,
            &metadata.signing_certificates(),
            Some(&metadata.requester_metadata()),
        )
        .unwrap_err();
    assert_eq!(err.http_status(), 401);

    Ok(())
}
