//! eIDAS AuthnRequest types.
//!
//! Authentication request sent by a connector to a proxy service, with the
//! eIDAS extensions (`SPType`, `RequestedAttributes`) and the requested
//! levels of assurance.

use chrono::{DateTime, Utc};
use eidas_core::attribute::{AttributeDefinition, AttributeRegistry, ImmutableAttributeMap};
use serde::{Deserialize, Serialize};

use super::{ATTRIBUTE_NAME_FORMAT_URI, NameIdPolicy, SamlBinding, SpType};
use crate::error::{SamlError, SamlResult};

/// eIDAS authentication request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EidasAuthnRequest {
    /// Unique identifier for this request.
    pub id: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// Entity ID (metadata URL) of the requesting connector.
    pub issuer: String,

    /// The endpoint the request is sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The URL where the response should be sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<String>,

    /// Binding to use for the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_binding: Option<String>,

    /// Human readable name of the requesting SP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,

    /// Sector of the requesting SP, absent when the metadata declares it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_type: Option<SpType>,

    /// Identifier of the SP on whose behalf the connector requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<String>,

    /// Country of the citizen; set by the receiving proxy service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citizen_country_code: Option<String>,

    /// Country of the requesting connector, taken from its signing
    /// certificate on receipt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_country_code: Option<String>,

    /// Name ID policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id_policy: Option<NameIdPolicy>,

    /// Requested levels of assurance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_authn_context: Option<RequestedAuthnContext>,

    /// Requested attributes.
    #[serde(default)]
    pub requested_attributes: Vec<RequestedAttribute>,

    /// Whether the IdP must authenticate the citizen anew.
    #[serde(default)]
    pub force_authn: bool,

    /// Whether the IdP must not interact with the citizen.
    #[serde(default)]
    pub is_passive: bool,

    /// The RelayState travelling with the message.
    #[serde(skip)]
    pub relay_state: Option<String>,
}

impl EidasAuthnRequest {
    /// Creates a new authentication request.
    ///
    /// eIDAS requests always force authentication.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: eidas_crypto::random::generate_saml_id(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: None,
            assertion_consumer_service_url: None,
            protocol_binding: None,
            provider_name: None,
            sp_type: None,
            requester_id: None,
            citizen_country_code: None,
            origin_country_code: None,
            name_id_policy: None,
            requested_authn_context: None,
            requested_attributes: Vec::new(),
            force_authn: true,
            is_passive: false,
            relay_state: None,
        }
    }

    /// Creates a new authentication request with a custom ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(issuer)
        }
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the protocol binding for the response.
    #[must_use]
    pub fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.protocol_binding = Some(binding.uri().to_string());
        self
    }

    /// Sets the provider name.
    #[must_use]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    /// Sets the SP type.
    #[must_use]
    pub const fn with_sp_type(mut self, sp_type: SpType) -> Self {
        self.sp_type = Some(sp_type);
        self
    }

    /// Sets the requester ID.
    #[must_use]
    pub fn with_requester_id(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = Some(requester_id.into());
        self
    }

    /// Sets the citizen country code.
    #[must_use]
    pub fn with_citizen_country(mut self, country: impl Into<String>) -> Self {
        self.citizen_country_code = Some(country.into());
        self
    }

    /// Sets the name ID policy.
    #[must_use]
    pub fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self
    }

    /// Sets the requested authentication context.
    #[must_use]
    pub fn with_authn_context(mut self, context: RequestedAuthnContext) -> Self {
        self.requested_authn_context = Some(context);
        self
    }

    /// Adds a requested attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: RequestedAttribute) -> Self {
        self.requested_attributes.push(attribute);
        self
    }

    /// Adds a requested attribute for every definition of `map`.
    #[must_use]
    pub fn with_attribute_map(mut self, map: &ImmutableAttributeMap) -> Self {
        for definition in map.definitions() {
            self.requested_attributes
                .push(RequestedAttribute::from_definition(definition));
        }
        self
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, state: impl Into<String>) -> Self {
        self.relay_state = Some(state.into());
        self
    }

    /// Returns the parsed protocol binding.
    #[must_use]
    pub fn parsed_binding(&self) -> Option<SamlBinding> {
        self.protocol_binding.as_deref().and_then(SamlBinding::from_uri)
    }

    /// Resolves the requested attributes against `registry`.
    ///
    /// Requested values are unmarshalled with the definition's marshaller.
    pub fn attribute_map(&self, registry: &AttributeRegistry) -> SamlResult<ImmutableAttributeMap> {
        let mut builder = ImmutableAttributeMap::builder();
        for requested in &self.requested_attributes {
            let definition = registry.get_by_name_uri(&requested.name).ok_or_else(|| {
                SamlError::Attribute(format!("unknown attribute {}", requested.name))
            })?;
            builder = if requested.values.is_empty() {
                builder.put_empty(definition.clone())
            } else {
                builder.put_primary_values(definition.clone(), &requested.values)?
            };
        }
        Ok(builder.build())
    }
}

/// Requested authentication context: levels of assurance and comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAuthnContext {
    /// Comparison method. Absent means `exact`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<AuthnContextComparison>,

    /// Requested level of assurance URIs.
    #[serde(default)]
    pub authn_context_class_refs: Vec<String>,
}

impl RequestedAuthnContext {
    /// Creates a context with the given comparison.
    #[must_use]
    pub const fn new(comparison: AuthnContextComparison) -> Self {
        Self {
            comparison: Some(comparison),
            authn_context_class_refs: Vec::new(),
        }
    }

    /// Creates a `minimum` context for one level.
    #[must_use]
    pub fn minimum(level: impl Into<String>) -> Self {
        Self::new(AuthnContextComparison::Minimum).with_class_ref(level)
    }

    /// Adds a level of assurance URI.
    #[must_use]
    pub fn with_class_ref(mut self, level: impl Into<String>) -> Self {
        self.authn_context_class_refs.push(level.into());
        self
    }

    /// Returns the comparison, defaulting to `exact`.
    #[must_use]
    pub fn effective_comparison(&self) -> AuthnContextComparison {
        self.comparison.unwrap_or_default()
    }
}

/// Authentication context comparison methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthnContextComparison {
    /// Exact match required.
    #[default]
    Exact,
    /// Match must be at least as strong.
    Minimum,
    /// Match must be at most as strong.
    Maximum,
    /// Match must be stronger.
    Better,
}

impl AuthnContextComparison {
    /// Returns the string value for this comparison.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::Better => "better",
        }
    }

    /// Parses a comparison value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "exact" => Some(Self::Exact),
            "minimum" => Some(Self::Minimum),
            "maximum" => Some(Self::Maximum),
            "better" => Some(Self::Better),
            _ => None,
        }
    }
}

/// `eidas:RequestedAttribute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAttribute {
    /// Attribute name URI.
    pub name: String,

    /// Friendly name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// Name format URI.
    pub name_format: String,

    /// Whether the attribute is required.
    pub required: bool,

    /// Requested values, usually empty.
    #[serde(default)]
    pub values: Vec<String>,
}

impl RequestedAttribute {
    /// Creates a requested attribute from a definition.
    #[must_use]
    pub fn from_definition(definition: &AttributeDefinition) -> Self {
        Self {
            name: definition.name_uri().to_string(),
            friendly_name: Some(definition.friendly_name().to_string()),
            name_format: ATTRIBUTE_NAME_FORMAT_URI.to_string(),
            required: definition.is_required(),
            values: Vec::new(),
        }
    }

    /// Adds a requested value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.values.push(value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidas_core::attribute::eidas_core_registry;

    const PERSON_IDENTIFIER: &str = "http://eidas.europa.eu/attributes/naturalperson/PersonIdentifier";

    #[test]
    fn authn_request_creation() {
        let request = EidasAuthnRequest::new("https://connector.example.eu/metadata")
            .with_acs_url("https://connector.example.eu/ColleagueResponse")
            .with_destination("https://proxy.example.eu/ColleagueRequest")
            .with_binding(SamlBinding::HttpPost)
            .with_sp_type(SpType::Public);

        assert!(request.id.starts_with('_'));
        assert!(request.force_authn);
        assert_eq!(request.parsed_binding(), Some(SamlBinding::HttpPost));
        assert_eq!(request.sp_type, Some(SpType::Public));
    }

    #[test]
    fn comparison_defaults_to_exact() {
        let context = RequestedAuthnContext::default();
        assert_eq!(context.effective_comparison(), AuthnContextComparison::Exact);
        assert_eq!(AuthnContextComparison::parse("minimum"), Some(AuthnContextComparison::Minimum));
        assert_eq!(AuthnContextComparison::parse("MINIMUM"), None);
    }

    #[test]
    fn requested_attributes_resolve_against_registry() {
        let registry = eidas_core_registry();
        let definition = registry.get_by_name_uri(PERSON_IDENTIFIER).unwrap();
        let request = EidasAuthnRequest::new("issuer")
            .with_attribute(RequestedAttribute::from_definition(definition));

        let map = request.attribute_map(&registry).unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.get_by_name_uri(PERSON_IDENTIFIER).is_some());

        let unknown = EidasAuthnRequest::new("issuer").with_attribute(RequestedAttribute {
            name: "urn:unknown".to_string(),
            friendly_name: None,
            name_format: ATTRIBUTE_NAME_FORMAT_URI.to_string(),
            required: false,
            values: Vec::new(),
        });
        assert!(matches!(
            unknown.attribute_map(&registry),
            Err(SamlError::Attribute(_))
        ));
    }
}
