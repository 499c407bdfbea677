//! Endpoint handlers.
//!
//! `ColleagueRequest` is the proxy service side of the exchange: the
//! connector's AuthnRequest is verified against the connector's metadata,
//! turned into a light request and parked in the correlation cache. The
//! returned token is what the specific proxy service redeems.

use axum::{
    Form, Json,
    extract::{OriginalUri, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use eidas_cache::AtomicCacheProvider;
use eidas_core::AttributeRegistry;
use eidas_light::LightRequest;
use eidas_saml::bindings::{self, SamlMessageType};
use eidas_saml::{EidasAuthnRequest, SamlBinding, SamlError, xml};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{NodeError, NodeResult};
use crate::state::AppState;

/// Form posted to `ColleagueRequest` over HTTP-POST.
#[derive(Debug, Deserialize)]
pub struct ColleagueRequestForm {
    /// Base64 AuthnRequest.
    #[serde(rename = "SAMLRequest")]
    pub saml_request: String,
    /// Opaque state echoed back to the connector.
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// Answer to an accepted request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColleagueRequestAccepted {
    /// Id of the accepted AuthnRequest.
    pub request_id: String,
    /// Binary light token redeeming the stored light request.
    pub token: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

/// Serves the signed node metadata.
pub async fn metadata<C: AtomicCacheProvider + 'static>(
    State(state): State<AppState<C>>,
) -> NodeResult<Response> {
    let xml = state.metadata_generator.generate(&state.node_metadata)?;
    Ok((
        [(header::CONTENT_TYPE, "application/samlmetadata+xml")],
        xml,
    )
        .into_response())
}

/// Receives an AuthnRequest over HTTP-POST.
pub async fn colleague_request_post<C: AtomicCacheProvider + 'static>(
    State(state): State<AppState<C>>,
    Form(form): Form<ColleagueRequestForm>,
) -> NodeResult<(StatusCode, Json<ColleagueRequestAccepted>)> {
    accept(&state, SamlBinding::HttpPost, &form.saml_request, form.relay_state).await
}

/// Receives an AuthnRequest over HTTP-Redirect.
pub async fn colleague_request_redirect<C: AtomicCacheProvider + 'static>(
    State(state): State<AppState<C>>,
    OriginalUri(uri): OriginalUri,
) -> NodeResult<(StatusCode, Json<ColleagueRequestAccepted>)> {
    let base_url = state.config.server.base_url.trim_end_matches('/');
    let url = format!("{base_url}{uri}");
    accept(&state, SamlBinding::HttpRedirect, &url, None).await
}

async fn accept<C: AtomicCacheProvider + 'static>(
    state: &AppState<C>,
    binding: SamlBinding,
    encoded: &str,
    relay_state: Option<String>,
) -> NodeResult<(StatusCode, Json<ColleagueRequestAccepted>)> {
    let issuer = requester_issuer(binding, encoded)?;
    debug!(issuer = %issuer, binding = binding.uri(), "request received");

    let metadata = state.metadata.get_metadata(&issuer).await?;
    let mut request = state.engine.process_request(
        encoded,
        binding,
        &metadata.signing_certificates(),
        Some(&metadata.requester_metadata()),
    )?;
    if relay_state.is_some() {
        request.relay_state = relay_state;
    }

    if !state.replay.check_and_record(&request.id).await? {
        return Err(NodeError::Replayed(request.id));
    }

    let light_request = light_request(&request, &state.registry)?;
    let token = state.light.put_request(&light_request).await?;
    info!(id = %request.id, issuer = %request.issuer, "request handed to the specific proxy service");

    Ok((
        StatusCode::OK,
        Json(ColleagueRequestAccepted {
            request_id: request.id,
            token: token.into_string(),
        }),
    ))
}

/// Reads the issuer of an unverified request, to look up whose
/// certificates must have signed it.
fn requester_issuer(binding: SamlBinding, encoded: &str) -> NodeResult<String> {
    let decoded = bindings::decode(binding, encoded, SamlMessageType::Request)?;
    let root = xml::parse(&decoded.xml)?;
    root.child_text("Issuer")
        .filter(|issuer| !issuer.is_empty())
        .ok_or_else(|| SamlError::MissingElement("AuthnRequest/Issuer".to_string()).into())
}

/// Maps a validated AuthnRequest to the light request handed to the
/// specific side.
pub fn light_request(request: &EidasAuthnRequest, registry: &AttributeRegistry) -> NodeResult<LightRequest> {
    let mut builder = LightRequest::builder()
        .id(&request.id)
        .issuer(&request.issuer)
        .citizen_country_code(request.citizen_country_code.clone().unwrap_or_default())
        .requested_attributes(request.attribute_map(registry)?);

    if let Some(country) = &request.origin_country_code {
        builder = builder.sp_country_code(country);
    }
    if let Some(relay_state) = &request.relay_state {
        builder = builder.relay_state(relay_state);
    }
    if let Some(provider_name) = &request.provider_name {
        builder = builder.provider_name(provider_name);
    }
    if let Some(requester_id) = &request.requester_id {
        builder = builder.requester_id(requester_id);
    }
    if let Some(sp_type) = request.sp_type {
        builder = builder.sp_type(sp_type.as_str());
    }
    if let Some(format) = request.name_id_policy.as_ref().and_then(|p| p.format.as_ref()) {
        builder = builder.name_id_format(format);
    }
    if let Some(context) = &request.requested_authn_context {
        for level in &context.authn_context_class_refs {
            builder = builder.level_of_assurance(level);
        }
        builder = builder.level_of_assurance_comparison(context.effective_comparison().as_str());
    }
    Ok(builder.build()?)
}

/// Basic health check.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidas_core::attribute::eidas_core_registry;
    use eidas_saml::{AuthnContextComparison, RequestedAuthnContext, SpType};

    fn request() -> EidasAuthnRequest {
        let mut request = EidasAuthnRequest::new("https://connector.example.eu/metadata");
        request.citizen_country_code = Some("BE".to_string());
        request.origin_country_code = Some("EU".to_string());
        request.sp_type = Some(SpType::Public);
        request.requested_authn_context = Some(
            RequestedAuthnContext::new(AuthnContextComparison::Minimum)
                .with_class_ref("http://eidas.europa.eu/LoA/substantial"),
        );
        request
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await;
        assert_eq!(response.0.status, "healthy");
    }

    #[test]
    fn light_request_carries_request_fields() {
        let request = request().with_relay_state("relay-1");
        let light = light_request(&request, &eidas_core_registry()).unwrap();
        assert_eq!(light.id, request.id);
        assert_eq!(light.issuer, "https://connector.example.eu/metadata");
        assert_eq!(light.citizen_country_code, "BE");
        assert_eq!(light.sp_country_code.as_deref(), Some("EU"));
        assert_eq!(light.relay_state.as_deref(), Some("relay-1"));
        assert_eq!(light.sp_type.as_deref(), Some("public"));
        assert_eq!(light.levels_of_assurance, ["http://eidas.europa.eu/LoA/substantial"]);
        assert_eq!(light.level_of_assurance_comparison.as_deref(), Some("minimum"));
    }

    #[test]
    fn light_request_needs_citizen_country() {
        let mut request = request();
        request.citizen_country_code = None;
        assert!(matches!(
            light_request(&request, &eidas_core_registry()),
            Err(NodeError::Light(_))
        ));
    }

    #[test]
    fn issuer_is_read_before_verification() {
        let xml = r#"<saml2p:AuthnRequest xmlns:saml2p="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion" ID="_1"><saml2:Issuer>https://connector.example.eu/metadata</saml2:Issuer></saml2p:AuthnRequest>"#;
        let encoded = bindings::HttpPostBinding::encode_value(xml);
        assert_eq!(
            requester_issuer(SamlBinding::HttpPost, &encoded).unwrap(),
            "https://connector.example.eu/metadata"
        );

        let no_issuer = bindings::HttpPostBinding::encode_value(
            r#"<saml2p:AuthnRequest xmlns:saml2p="urn:oasis:names:tc:SAML:2.0:protocol" ID="_1"/>"#,
        );
        assert!(requester_issuer(SamlBinding::HttpPost, &no_issuer).is_err());
    }
}
