//! Application state management.
//!
//! This module defines the shared state that is passed to all request handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use eidas_cache::{AntiReplayGuard, AtomicCacheProvider};
use eidas_core::{AttributeRegistry, NodeConfig, attribute::eidas_core_registry};
use eidas_crypto::Certificate;
use eidas_light::{NodeSide, SpecificCommunicationService};
use eidas_metadata::{
    CachingMetadataFetcher, EidasMetadataParameters, EidasMetadataRoleParameters, FetcherSettings,
    HttpMetadataFetcher, MetadataFetcher, MetadataGenerator, MetadataRole,
};
use eidas_saml::loa::NotifiedLevelOfAssurance;
use eidas_saml::{EngineSettings, ProtocolEngine, SamlBinding};
use eidas_security::SecurityRequestFilter;

use crate::credentials::NodeCredentials;

/// Path of the metadata endpoint, also the node entity id.
pub const METADATA_PATH: &str = "/metadata";

/// Path receiving authentication requests from connectors.
pub const COLLEAGUE_REQUEST_PATH: &str = "/ColleagueRequest";

/// Application state shared across all request handlers.
pub struct AppState<C> {
    /// Node configuration.
    pub config: Arc<NodeConfig>,
    /// SAML protocol engine.
    pub engine: Arc<ProtocolEngine>,
    /// Source of requester metadata.
    pub metadata: Arc<dyn MetadataFetcher>,
    /// Signs the node metadata.
    pub metadata_generator: Arc<MetadataGenerator>,
    /// Published description of this node.
    pub node_metadata: Arc<EidasMetadataParameters>,
    /// Attribute definitions known to the node.
    pub registry: Arc<AttributeRegistry>,
    /// Hands requests to the specific side.
    pub light: Arc<SpecificCommunicationService<C>>,
    /// Rejects requests whose id was already processed.
    pub replay: Arc<AntiReplayGuard<C>>,
    /// Anti-abuse filter in front of the protocol endpoints.
    pub security: Arc<SecurityRequestFilter>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            engine: Arc::clone(&self.engine),
            metadata: Arc::clone(&self.metadata),
            metadata_generator: Arc::clone(&self.metadata_generator),
            node_metadata: Arc::clone(&self.node_metadata),
            registry: Arc::clone(&self.registry),
            light: Arc::clone(&self.light),
            replay: Arc::clone(&self.replay),
            security: Arc::clone(&self.security),
        }
    }
}

impl<C: AtomicCacheProvider + 'static> AppState<C> {
    /// Creates the state of a proxy service node.
    pub fn new(
        config: NodeConfig,
        credentials: &NodeCredentials,
        cache: Arc<C>,
        metadata: Arc<dyn MetadataFetcher>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let base_url = config.server.base_url.trim_end_matches('/').to_string();
        let entity_id = format!("{base_url}{METADATA_PATH}");
        let service_url = format!("{base_url}{COLLEAGUE_REQUEST_PATH}");

        let settings = EngineSettings::from_saml_config(&entity_id, &config.saml)?.with_service_url(&service_url);
        let engine = ProtocolEngine::new(
            settings,
            credentials.signer()?,
            credentials.encryption_configuration(&config.saml)?,
        );

        let registry = Arc::new(eidas_core_registry());
        let node_metadata = node_metadata(&config, &entity_id, &service_url, credentials, &registry)?;
        let metadata_generator = MetadataGenerator::new(credentials.signer()?)
            .with_validity(chrono::Duration::seconds(
                i64::try_from(config.metadata.validity_secs).unwrap_or(i64::MAX),
            ));

        let light = SpecificCommunicationService::new(
            NodeSide::Proxy,
            Arc::clone(&cache),
            Arc::clone(&registry),
            &config.light_request,
            &config.light_response,
        )?;
        let retention = Duration::from_secs(config.saml.assertion_validity_secs + config.saml.clock_skew_secs);
        let security = SecurityRequestFilter::new(config.security.clone());

        Ok(Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            metadata,
            metadata_generator: Arc::new(metadata_generator),
            node_metadata: Arc::new(node_metadata),
            registry,
            light: Arc::new(light),
            replay: Arc::new(AntiReplayGuard::new(cache, retention)),
            security: Arc::new(security),
        })
    }
}

fn node_metadata(
    config: &NodeConfig,
    entity_id: &str,
    service_url: &str,
    credentials: &NodeCredentials,
    registry: &AttributeRegistry,
) -> anyhow::Result<EidasMetadataParameters> {
    let mut role = EidasMetadataRoleParameters::new(MetadataRole::Idp)
        .with_signing_certificate(credentials.signing_certificate()?)
        .with_endpoint(SamlBinding::HttpPost, service_url)
        .with_endpoint(SamlBinding::HttpRedirect, service_url);
    if let Some(certificate) = credentials.decryption_certificate()? {
        role = role.with_encryption_certificate(certificate);
    }
    for definition in registry.iter() {
        role = role.with_supported_attribute(definition.name_uri());
    }

    let mut params = EidasMetadataParameters::new(entity_id)
        .with_node_country(&config.saml.country)
        .with_role(role);
    for level in NotifiedLevelOfAssurance::ALL {
        params = params.with_assurance_level(level.uri());
    }
    Ok(params)
}

/// Builds the production metadata source: HTTP retrieval behind the cache,
/// validating signatures against the configured certificates.
pub fn http_metadata_fetcher(config: &NodeConfig) -> anyhow::Result<Arc<dyn MetadataFetcher>> {
    let settings = FetcherSettings::from_config(&config.metadata);
    let trusted = config
        .metadata
        .trusted_certificates
        .split(';')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(|path| {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read metadata certificate {path}"))?;
            Certificate::from_pem(&pem).with_context(|| format!("invalid metadata certificate {path}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    if settings.validate_signature && trusted.is_empty() {
        tracing::warn!("metadata signature validation is enabled without trusted certificates");
    }

    let http = HttpMetadataFetcher::new(settings.clone(), trusted)?;
    Ok(Arc::new(CachingMetadataFetcher::new(http, settings)))
}
