#![allow(dead_code)]

//! Common test utilities and fixtures.

use std::sync::Arc;

use eidas_cache::MemoryCacheProvider;
use eidas_core::NodeConfig;
use eidas_core::attribute::eidas_core_registry;
use eidas_crypto::Certificate;
use eidas_light::{NodeSide, SpecificCommunicationService};
use eidas_metadata::{EidasMetadataParameters, EidasMetadataRoleParameters, MetadataRole, StaticMetadataSource};
use eidas_node::{AppState, NodeCredentials, create_router};
use eidas_saml::encryption::{DecryptionCredential, EncryptionConfiguration};
use eidas_saml::loa::NotifiedLevelOfAssurance;
use eidas_saml::signature::XmlSigner;
use eidas_saml::{EidasAuthnRequest, EngineSettings, ProtocolEngine, RequestedAuthnContext, SamlBinding};
use reqwest::Client;
use tokio::net::TcpListener;

pub const CONNECTOR_KEY: &str = include_str!("../../../testdata/connector-key.pem");
pub const CONNECTOR_CERT: &str = include_str!("../../../testdata/connector-cert.pem");
pub const PROXY_KEY: &str = include_str!("../../../testdata/proxy-key.pem");
pub const PROXY_CERT: &str = include_str!("../../../testdata/proxy-cert.pem");
pub const EC_KEY: &str = include_str!("../../../testdata/ec-key.pem");
pub const EC_CERT: &str = include_str!("../../../testdata/ec-cert.pem");

pub const CONNECTOR_ID: &str = "https://connector.example.eu/metadata";
pub const CONNECTOR_ACS: &str = "https://connector.example.eu/ColleagueResponse";
pub const CONNECTOR_REFERER: &str = "https://connector.example.eu/sp/login";

/// Initializes tracing once for the whole test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("eidas_node=debug,eidas_saml=debug,eidas_security=debug")
        .try_init();
}

pub fn cert(pem: &str) -> Certificate {
    Certificate::from_pem(pem).unwrap()
}

/// Connector engine signing with `key`/`cert_pem` and decrypting with the
/// same pair.
pub fn connector_engine(key: &str, cert_pem: &str) -> ProtocolEngine {
    ProtocolEngine::new(
        EngineSettings::new(CONNECTOR_ID, "EU"),
        XmlSigner::from_pem(key, cert_pem).unwrap(),
        EncryptionConfiguration::default()
            .with_decryption_credential(DecryptionCredential::from_pem(key, cert_pem).unwrap()),
    )
}

/// Metadata the connector publishes.
pub fn connector_metadata(signing_cert: &str) -> EidasMetadataParameters {
    EidasMetadataParameters::new(CONNECTOR_ID)
        .with_node_country("EU")
        .with_role(
            EidasMetadataRoleParameters::new(MetadataRole::Sp)
                .with_signing_certificate(cert(signing_cert))
                .with_encryption_certificate(cert(signing_cert))
                .with_endpoint(SamlBinding::HttpPost, CONNECTOR_ACS),
        )
}

/// Request for `destination` asking for substantial assurance.
pub fn authn_request(destination: &str) -> EidasAuthnRequest {
    EidasAuthnRequest::new(CONNECTOR_ID)
        .with_destination(destination)
        .with_acs_url(CONNECTOR_ACS)
        .with_sp_type(eidas_saml::SpType::Public)
        .with_authn_context(RequestedAuthnContext::minimum(NotifiedLevelOfAssurance::Substantial.uri()))
}

/// A running proxy service node.
pub struct TestEnv {
    /// Base URL of the running server.
    pub base_url: String,
    /// HTTP client for testing.
    pub client: Client,
    /// Correlation cache shared with the node.
    pub cache: Arc<MemoryCacheProvider>,
    /// Configuration the node runs with.
    pub config: NodeConfig,
}

impl TestEnv {
    /// Starts a node trusting the RSA connector.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(|_| {}).await
    }

    /// Starts a node after applying `configure` to the test configuration.
    pub async fn with_config(configure: impl FnOnce(&mut NodeConfig)) -> anyhow::Result<Self> {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let mut config = NodeConfig::for_testing();
        config.server.base_url = base_url.clone();
        configure(&mut config);

        let cache = Arc::new(MemoryCacheProvider::new());
        let metadata = StaticMetadataSource::new().with_metadata(connector_metadata(CONNECTOR_CERT));
        let credentials = NodeCredentials::new(PROXY_KEY, PROXY_CERT).with_decryption(PROXY_KEY, PROXY_CERT);
        let state = AppState::new(config.clone(), &credentials, Arc::clone(&cache), Arc::new(metadata))?;
        let app = create_router(state);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Server error: {}", e);
            }
        });

        Ok(Self {
            base_url,
            client: Client::new(),
            cache,
            config,
        })
    }

    /// Endpoint receiving the connector's requests.
    pub fn colleague_request_url(&self) -> String {
        format!("{}/ColleagueRequest", self.base_url)
    }

    /// Specific side view of the node's correlation cache.
    pub fn specific_service(&self) -> SpecificCommunicationService<MemoryCacheProvider> {
        SpecificCommunicationService::new(
            NodeSide::Proxy,
            Arc::clone(&self.cache),
            Arc::new(eidas_core_registry()),
            &self.config.light_request,
            &self.config.light_response,
        )
        .unwrap()
    }

    /// Posts an encoded AuthnRequest the way the connector's browser does.
    pub async fn post_request(&self, encoded: &str) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .client
            .post(self.colleague_request_url())
            .header("referer", CONNECTOR_REFERER)
            .form(&[("SAMLRequest", encoded), ("RelayState", "relay-42")])
            .send()
            .await?)
    }
}
