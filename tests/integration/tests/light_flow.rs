//! Light request and response exchange between the node and the specific
//! proxy service over one correlation cache.

use std::sync::Arc;

use eidas_cache::MemoryCacheProvider;
use eidas_core::attribute::{AttributeValue, eidas_core_registry};
use eidas_core::config::LightTokenConfig;
use eidas_core::{ImmutableAttributeMap, NodeConfig};
use eidas_light::{LightError, LightResponse, LightTokenError, NodeSide, ResponseStatus, SpecificCommunicationService};
use eidas_node::handlers::light_request;
use eidas_saml::RequestedAttribute;

use crate::common::*;

const PERSON_IDENTIFIER: &str = "http://eidas.europa.eu/attributes/naturalperson/PersonIdentifier";

fn service(
    cache: &Arc<MemoryCacheProvider>,
    request: &LightTokenConfig,
    response: &LightTokenConfig,
) -> SpecificCommunicationService<MemoryCacheProvider> {
    SpecificCommunicationService::new(
        NodeSide::Proxy,
        Arc::clone(cache),
        Arc::new(eidas_core_registry()),
        request,
        response,
    )
    .unwrap()
}

#[tokio::test]
async fn test_request_and_response_cross_the_cache() -> anyhow::Result<()> {
    init_tracing();
    let config = NodeConfig::for_testing();
    let cache = Arc::new(MemoryCacheProvider::new());
    let node = service(&cache, &config.light_request, &config.light_response);
    let specific = service(&cache, &config.light_request, &config.light_response);

    let registry = eidas_core_registry();
    let identifier = registry.get_by_name_uri(PERSON_IDENTIFIER).expect("PersonIdentifier");
    let mut saml_request = authn_request("https://proxy.example.eu/ColleagueRequest")
        .with_relay_state("relay-7")
        .with_attribute(RequestedAttribute::from_definition(identifier));
    saml_request.citizen_country_code = Some("BE".to_string());

    let outgoing = light_request(&saml_request, &registry)?;
    let token = node.put_request(&outgoing).await?;

    let received = specific.get_and_remove_request(token.as_str()).await?;
    assert_eq!(received, outgoing);
    assert_eq!(received.relay_state.as_deref(), Some("relay-7"));
    assert!(received.requested_attributes.get_by_name_uri(PERSON_IDENTIFIER).is_some());

    let response = LightResponse::builder()
        .id("_light_response")
        .in_response_to_id(&received.id)
        .issuer("specific-proxy-service")
        .subject("BE/EU/0123456")
        .level_of_assurance("http://eidas.europa.eu/LoA/substantial")
        .status(ResponseStatus::success())
        .attributes(
            ImmutableAttributeMap::builder()
                .put_value(identifier.clone(), AttributeValue::string("BE/EU/0123456"))
                .build(),
        )
        .build()?;
    let response_token = specific.put_response(&response).await?;

    let back = node.get_and_remove_response(response_token.as_str()).await?;
    assert_eq!(back, response);
    assert_eq!(back.in_response_to_id, saml_request.id);

    Ok(())
}

#[tokio::test]
async fn test_token_is_single_use_across_instances() -> anyhow::Result<()> {
    let config = NodeConfig::for_testing();
    let cache = Arc::new(MemoryCacheProvider::new());
    let node = service(&cache, &config.light_request, &config.light_response);
    let first = service(&cache, &config.light_request, &config.light_response);
    let second = service(&cache, &config.light_request, &config.light_response);

    let mut saml_request = authn_request("https://proxy.example.eu/ColleagueRequest");
    saml_request.citizen_country_code = Some("BE".to_string());
    let token = node
        .put_request(&light_request(&saml_request, &eidas_core_registry())?)
        .await?;

    assert!(first.get_and_remove_request(token.as_str()).await.is_ok());
    assert!(matches!(
        second.get_and_remove_request(token.as_str()).await,
        Err(LightError::Missing(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_wrong_secret_does_not_consume_the_message() -> anyhow::Result<()> {
    let config = NodeConfig::for_testing();
    let cache = Arc::new(MemoryCacheProvider::new());
    let node = service(&cache, &config.light_request, &config.light_response);

    let mut wrong = config.light_request.clone();
    wrong.secret = "not-the-shared-secret".to_string();
    let intruder = service(&cache, &wrong, &config.light_response);

    let mut saml_request = authn_request("https://proxy.example.eu/ColleagueRequest");
    saml_request.citizen_country_code = Some("BE".to_string());
    let token = node
        .put_request(&light_request(&saml_request, &eidas_core_registry())?)
        .await?;

    let err = intruder.get_and_remove_request(token.as_str()).await.unwrap_err();
    assert!(matches!(err, LightError::Token(LightTokenError::Digest)));

    let stored = node.get_and_remove_request(token.as_str()).await?;
    assert_eq!(stored.id, saml_request.id);

    Ok(())
}
