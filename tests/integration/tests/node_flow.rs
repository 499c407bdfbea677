//! `ColleagueRequest` against a running node.

use eidas_node::handlers::ColleagueRequestAccepted;
use eidas_saml::SamlBinding;
use reqwest::StatusCode;

use crate::common::*;

#[tokio::test]
async fn test_accepted_request_is_redeemable() -> anyhow::Result<()> {
    let env = TestEnv::with_config(|config| {
        config.security.trusted_domains = "connector.example.eu".to_string();
    })
    .await?;

    let request = authn_request(&env.colleague_request_url());
    let encoded = connector_engine(CONNECTOR_KEY, CONNECTOR_CERT).generate_request(&request, SamlBinding::HttpPost)?;

    let response = env.post_request(&encoded.encoded).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let accepted: ColleagueRequestAccepted = serde_json::from_str(&response.text().await?)?;
    assert_eq!(accepted.request_id, request.id);

    let light = env.specific_service().get_and_remove_request(&accepted.token).await?;
    assert_eq!(light.id, request.id);
    assert_eq!(light.issuer, CONNECTOR_ID);
    assert_eq!(light.relay_state.as_deref(), Some("relay-42"));
    assert_eq!(light.citizen_country_code, "EU");
    assert_eq!(light.sp_country_code.as_deref(), Some("EU"));
    assert_eq!(light.sp_type.as_deref(), Some("public"));

    Ok(())
}

#[tokio::test]
async fn test_redirect_binding_is_accepted() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let request = authn_request(&env.colleague_request_url()).with_relay_state("relay-r");
    let encoded =
        connector_engine(CONNECTOR_KEY, CONNECTOR_CERT).generate_request(&request, SamlBinding::HttpRedirect)?;

    let response = env
        .client
        .get(&encoded.encoded)
        .header("referer", CONNECTOR_REFERER)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let accepted: ColleagueRequestAccepted = serde_json::from_str(&response.text().await?)?;

    let light = env.specific_service().get_and_remove_request(&accepted.token).await?;
    assert_eq!(light.relay_state.as_deref(), Some("relay-r"));

    Ok(())
}

#[tokio::test]
async fn test_replayed_request_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let request = authn_request(&env.colleague_request_url());
    let encoded = connector_engine(CONNECTOR_KEY, CONNECTOR_CERT).generate_request(&request, SamlBinding::HttpPost)?;

    assert_eq!(env.post_request(&encoded.encoded).await?.status(), StatusCode::OK);

    let replay = env.post_request(&encoded.encoded).await?;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&replay.text().await?)?;
    assert_eq!(body["error"], "COLLEAGUE_REQ_INVALID_SAML");

    Ok(())
}

#[tokio::test]
async fn test_untrusted_referer_is_forbidden() -> anyhow::Result<()> {
    let env = TestEnv::with_config(|config| {
        config.security.trusted_domains = "other.example.eu".to_string();
    })
    .await?;

    let encoded = connector_engine(CONNECTOR_KEY, CONNECTOR_CERT)
        .generate_request(&authn_request(&env.colleague_request_url()), SamlBinding::HttpPost)?;
    let response = env.post_request(&encoded.encoded).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = serde_json::from_str(&response.text().await?)?;
    assert_eq!(body["error"], "CONNECTOR_DOMAIN");

    Ok(())
}

#[tokio::test]
async fn test_requests_over_the_limit_are_throttled() -> anyhow::Result<()> {
    let env = TestEnv::with_config(|config| {
        config.security.ip_max_time_secs = 60;
        config.security.ip_max_requests = 2;
    })
    .await?;
    let connector = connector_engine(CONNECTOR_KEY, CONNECTOR_CERT);

    for _ in 0..2 {
        let encoded = connector.generate_request(&authn_request(&env.colleague_request_url()), SamlBinding::HttpPost)?;
        assert_eq!(env.post_request(&encoded.encoded).await?.status(), StatusCode::OK);
    }

    let encoded = connector.generate_request(&authn_request(&env.colleague_request_url()), SamlBinding::HttpPost)?;
    let response = env.post_request(&encoded.encoded).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = serde_json::from_str(&response.text().await?)?;
    assert_eq!(body["error"], "REQUESTS_COLLEAGUE_REQUEST");

    Ok(())
}

#[tokio::test]
async fn test_request_signed_by_unknown_key_is_unauthorized() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let encoded =
        connector_engine(EC_KEY, EC_CERT).generate_request(&authn_request(&env.colleague_request_url()), SamlBinding::HttpPost)?;
    let response = env.post_request(&encoded.encoded).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_metadata_is_published() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.client.get(format!("{}/metadata", env.base_url)).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    let xml = response.text().await?;
    let params = eidas_metadata::MetadataParser::parse(&xml)?;
    assert_eq!(params.entity_id, format!("{}/metadata", env.base_url));

    Ok(())
}
