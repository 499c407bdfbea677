//! Specific communication service.
//!
//! Each side of the node owns two correlation caches: one for light
//! requests and one for light responses. A message is stored under the id of
//! a freshly issued token; retrieving it verifies the token and removes the
//! message atomically, so a token can be redeemed once.

use std::sync::Arc;
use std::time::Duration;

use eidas_cache::AtomicCacheProvider;
use eidas_core::AttributeRegistry;
use eidas_core::config::LightTokenConfig;

use crate::error::{LightError, LightResult};
use crate::message::{LightRequest, LightResponse};
use crate::token::{BinaryLightToken, LightToken, LightTokenCodec};

/// Which side of the node the service is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeSide {
    /// eIDAS-Connector (service provider country).
    Connector,
    /// eIDAS-Proxy-Service (citizen country).
    Proxy,
}

impl NodeSide {
    /// Name of the light request correlation cache.
    #[must_use]
    pub const fn request_cache(self) -> &'static str {
        match self {
            Self::Connector => "specificNodeConnectorRequestCache",
            Self::Proxy => "nodeSpecificProxyserviceRequestCache",
        }
    }

    /// Name of the light response correlation cache.
    #[must_use]
    pub const fn response_cache(self) -> &'static str {
        match self {
            Self::Connector => "nodeSpecificConnectorResponseCache",
            Self::Proxy => "specificNodeProxyserviceResponseCache",
        }
    }
}

struct Channel {
    cache_name: &'static str,
    codec: LightTokenCodec,
    ttl: Duration,
}

impl Channel {
    fn new(cache_name: &'static str, config: &LightTokenConfig) -> LightResult<Self> {
        Ok(Self {
            cache_name,
            codec: LightTokenCodec::new(config)?,
            ttl: config.ttl(),
        })
    }

    fn key(&self, token: &LightToken) -> String {
        format!("{}:{}", self.cache_name, token.id())
    }
}

/// Stores light messages and hands out tokens for them.
pub struct SpecificCommunicationService<C> {
    side: NodeSide,
    cache: Arc<C>,
    registry: Arc<AttributeRegistry>,
    request: Channel,
    response: Channel,
}

impl<C: AtomicCacheProvider> SpecificCommunicationService<C> {
    /// Creates a service for one side of the node.
    pub fn new(
        side: NodeSide,
        cache: Arc<C>,
        registry: Arc<AttributeRegistry>,
        request_config: &LightTokenConfig,
        response_config: &LightTokenConfig,
    ) -> LightResult<Self> {
        Ok(Self {
            side,
            cache,
            registry,
            request: Channel::new(side.request_cache(), request_config)?,
            response: Channel::new(side.response_cache(), response_config)?,
        })
    }

    /// Returns the side this service serves.
    #[must_use]
    pub const fn side(&self) -> NodeSide {
        self.side
    }

    /// Stores a light request and returns the token that redeems it.
    pub async fn put_request(&self, request: &LightRequest) -> LightResult<BinaryLightToken> {
        request.validate()?;
        self.put(&self.request, request.to_xml()?).await
    }

    /// Redeems a request token, removing the stored request.
    pub async fn get_and_remove_request(&self, binary_token: &str) -> LightResult<LightRequest> {
        let xml = self.take(&self.request, binary_token).await?;
        LightRequest::from_xml(&xml, &self.registry)
    }

    /// Stores a light response and returns the token that redeems it.
    pub async fn put_response(&self, response: &LightResponse) -> LightResult<BinaryLightToken> {
        response.validate()?;
        self.put(&self.response, response.to_xml()?).await
    }

    /// Redeems a response token, removing the stored response.
    pub async fn get_and_remove_response(&self, binary_token: &str) -> LightResult<LightResponse> {
        let xml = self.take(&self.response, binary_token).await?;
        LightResponse::from_xml(&xml, &self.registry)
    }

    async fn put(&self, channel: &Channel, xml: String) -> LightResult<BinaryLightToken> {
        let token = channel.codec.create_token()?;
        self.cache
            .set(&channel.key(&token), &xml, Some(channel.ttl))
            .await?;
        tracing::debug!(
            cache = channel.cache_name,
            token_id = token.id(),
            "stored light message"
        );
        Ok(channel.codec.encode_binary(&token))
    }

    async fn take(&self, channel: &Channel, binary_token: &str) -> LightResult<String> {
        let token = channel.codec.decode_binary(binary_token)?;
        let xml: Option<String> = self.cache.get_del(&channel.key(&token)).await?;
        xml.ok_or_else(|| {
            tracing::warn!(
                cache = channel.cache_name,
                token_id = token.id(),
                "light token has no stored message"
            );
            LightError::Missing(token.id().to_string())
        })
    }
}
