//! Remote metadata retrieval, caching and use in request verification.

use chrono::{Duration, Utc};
use eidas_metadata::{
    CachingMetadataFetcher, FetcherSettings, HttpMetadataFetcher, MetadataError, MetadataFetcher, MetadataGenerator,
    MetadataWhitelist,
};
use eidas_saml::encryption::EncryptionConfiguration;
use eidas_saml::signature::XmlSigner;
use eidas_saml::{EngineSettings, ProtocolEngine, SamlBinding};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::*;

fn published(entity_id: &str, valid_for: Duration) -> anyhow::Result<String> {
    let generator = MetadataGenerator::new(XmlSigner::from_pem(CONNECTOR_KEY, CONNECTOR_CERT)?);
    let mut params = connector_metadata(CONNECTOR_CERT).with_valid_until(Utc::now() + valid_for);
    params.entity_id = entity_id.to_string();
    Ok(generator.generate(&params)?)
}

fn fetcher(settings: FetcherSettings) -> anyhow::Result<CachingMetadataFetcher<HttpMetadataFetcher>> {
    let http = HttpMetadataFetcher::new(settings.clone(), vec![cert(CONNECTOR_CERT)])?;
    Ok(CachingMetadataFetcher::new(http, settings))
}

#[tokio::test]
async fn test_metadata_is_fetched_once_while_valid() -> anyhow::Result<()> {
    init_tracing();
    let server = MockServer::start().await;
    let url = format!("{}/metadata", server.uri());
    Mock::given(method("GET"))
        .and(path("/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_string(published(&url, Duration::days(1))?))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(FetcherSettings::default().with_http_allowed(true))?;
    let first = fetcher.get_metadata(&url).await?;
    let second = fetcher.get_metadata(&url).await?;

    assert_eq!(first.entity_id, url);
    assert_eq!(first.valid_until, second.valid_until);
    assert_eq!(fetcher.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_expired_metadata_is_fetched_again() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let url = format!("{}/metadata", server.uri());
    Mock::given(method("GET"))
        .and(path("/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_string(published(&url, Duration::minutes(1))?))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_string(published(&url, Duration::days(1))?))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(FetcherSettings::default().with_http_allowed(true))?;
    let now = Utc::now();
    let short_lived = fetcher.get_metadata_at(&url, now).await?;
    let refreshed = fetcher.get_metadata_at(&url, now + Duration::minutes(5)).await?;

    assert!(refreshed.valid_until > short_lived.valid_until);
    assert!(refreshed.is_valid_at(now + Duration::hours(1)));

    Ok(())
}

#[tokio::test]
async fn test_url_outside_whitelist_is_not_fetched() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let url = format!("{}/metadata", server.uri());
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let settings = FetcherSettings::default()
        .with_http_allowed(true)
        .with_whitelist(MetadataWhitelist::parse("https://connector.example.eu/metadata"));
    let err = fetcher(settings)?.get_metadata(&url).await.unwrap_err();
    assert!(matches!(err, MetadataError::NoMetadata(_)));

    Ok(())
}

#[tokio::test]
async fn test_fetched_metadata_verifies_requests() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let url = format!("{}/metadata", server.uri());
    Mock::given(method("GET"))
        .and(path("/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_string(published(&url, Duration::days(1))?))
        .mount(&server)
        .await;

    let destination = "https://proxy.example.eu/ColleagueRequest";
    let connector = ProtocolEngine::new(
        EngineSettings::new(&url, "EU"),
        XmlSigner::from_pem(CONNECTOR_KEY, CONNECTOR_CERT)?,
        EncryptionConfiguration::default(),
    );
    let mut request = authn_request(destination);
    request.issuer = url.clone();
    let encoded = connector.generate_request(&request, SamlBinding::HttpPost)?;

    let proxy = ProtocolEngine::new(
        EngineSettings::new("https://proxy.example.eu/metadata", "BE").with_service_url(destination),
        XmlSigner::from_pem(PROXY_KEY, PROXY_CERT)?,
        EncryptionConfiguration::default(),
    );
    let metadata = fetcher(FetcherSettings::default().with_http_allowed(true))?
        .get_metadata(&url)
        .await?;
    let received = proxy.process_request(
        &encoded.encoded,
        SamlBinding::HttpPost,
        &metadata.signing_certificates(),
        Some(&metadata.requester_metadata()),
    )?;
    assert_eq!(received.issuer, url);

    Ok(())
}
