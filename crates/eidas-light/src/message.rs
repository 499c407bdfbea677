//! Light requests and light responses.
//!
//! These are the protocol-neutral messages exchanged with the specific
//! adapters. Their XML form (`<lightRequest>`, `<lightResponse>`) is what is
//! stored in the correlation caches.

use eidas_core::{AttributeRegistry, ImmutableAttributeMap};
use serde::{Deserialize, Serialize};

use crate::error::{LightError, LightResult};

/// SAML top level success status.
pub const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

const DOCTYPE: &str = "<!DOCTYPE";

fn require(field: &str, value: &str) -> LightResult<()> {
    if value.trim().is_empty() {
        return Err(LightError::Validation(format!("{field} is mandatory")));
    }
    Ok(())
}

fn reject_doctype(xml: &str) -> LightResult<()> {
    if xml.contains(DOCTYPE) {
        return Err(LightError::Xml("DOCTYPE is disallowed".to_string()));
    }
    Ok(())
}

/// Authentication request passed between the node and a specific adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct LightRequest {
    /// Request identifier.
    pub id: String,
    /// Issuer of the light request.
    pub issuer: String,
    /// Opaque relay state.
    pub relay_state: Option<String>,
    /// Country of the citizen to authenticate.
    pub citizen_country_code: String,
    /// Country of the requesting service provider.
    pub sp_country_code: Option<String>,
    /// Requested levels of assurance.
    pub levels_of_assurance: Vec<String>,
    /// Level of assurance comparison (`minimum` or `exact`).
    pub level_of_assurance_comparison: Option<String>,
    /// Requested name identifier format.
    pub name_id_format: Option<String>,
    /// Provider name.
    pub provider_name: Option<String>,
    /// Service provider sector (`public` or `private`).
    pub sp_type: Option<String>,
    /// Identifier of the requesting service provider.
    pub requester_id: Option<String>,
    /// Requested attributes (values are usually empty).
    pub requested_attributes: ImmutableAttributeMap,
}

impl LightRequest {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> LightRequestBuilder {
        LightRequestBuilder::default()
    }

    /// Checks the mandatory fields.
    pub fn validate(&self) -> LightResult<()> {
        require("id", &self.id)?;
        require("issuer", &self.issuer)?;
        require("citizenCountryCode", &self.citizen_country_code)?;
        if self.levels_of_assurance.iter().any(|loa| loa.trim().is_empty()) {
            return Err(LightError::Validation(
                "levelOfAssurance cannot be blank".to_string(),
            ));
        }
        if let Some(comparison) = &self.level_of_assurance_comparison {
            if !matches!(comparison.as_str(), "minimum" | "exact") {
                return Err(LightError::Validation(format!(
                    "unsupported levelOfAssurance comparison {comparison}"
                )));
            }
        }
        Ok(())
    }

    /// Serializes the request to `<lightRequest>` XML.
    pub fn to_xml(&self) -> LightResult<String> {
        let wire = LightRequestXml {
            id: self.id.clone(),
            issuer: self.issuer.clone(),
            relay_state: self.relay_state.clone(),
            citizen_country_code: self.citizen_country_code.clone(),
            sp_country_code: self.sp_country_code.clone(),
            levels_of_assurance: self.levels_of_assurance.clone(),
            level_of_assurance_comparison: self.level_of_assurance_comparison.clone(),
            name_id_format: self.name_id_format.clone(),
            provider_name: self.provider_name.clone(),
            sp_type: self.sp_type.clone(),
            requester_id: self.requester_id.clone(),
            requested_attributes: AttributesXml::from_map(&self.requested_attributes)?,
        };
        quick_xml::se::to_string(&wire).map_err(|e| LightError::Xml(e.to_string()))
    }

    /// Parses and validates `<lightRequest>` XML, resolving attributes in `registry`.
    pub fn from_xml(xml: &str, registry: &AttributeRegistry) -> LightResult<Self> {
        reject_doctype(xml)?;
        let wire: LightRequestXml =
            quick_xml::de::from_str(xml).map_err(|e| LightError::Xml(e.to_string()))?;
        let request = Self {
            id: wire.id,
            issuer: wire.issuer,
            relay_state: wire.relay_state,
            citizen_country_code: wire.citizen_country_code,
            sp_country_code: wire.sp_country_code,
            levels_of_assurance: wire.levels_of_assurance,
            level_of_assurance_comparison: wire.level_of_assurance_comparison,
            name_id_format: wire.name_id_format,
            provider_name: wire.provider_name,
            sp_type: wire.sp_type,
            requester_id: wire.requester_id,
            requested_attributes: wire.requested_attributes.into_map(registry)?,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Builder for [`LightRequest`].
#[derive(Debug, Clone, Default)]
pub struct LightRequestBuilder {
    id: String,
    issuer: String,
    relay_state: Option<String>,
    citizen_country_code: String,
    sp_country_code: Option<String>,
    levels_of_assurance: Vec<String>,
    level_of_assurance_comparison: Option<String>,
    name_id_format: Option<String>,
    provider_name: Option<String>,
    sp_type: Option<String>,
    requester_id: Option<String>,
    requested_attributes: Option<ImmutableAttributeMap>,
}

impl LightRequestBuilder {
    /// Sets the identifier.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the issuer.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the relay state.
    #[must_use]
    pub fn relay_state(mut self, relay_state: impl Into<String>) -> Self {
        self.relay_state = Some(relay_state.into());
        self
    }

    /// Sets the citizen country code.
    #[must_use]
    pub fn citizen_country_code(mut self, code: impl Into<String>) -> Self {
        self.citizen_country_code = code.into();
        self
    }

    /// Sets the service provider country code.
    #[must_use]
    pub fn sp_country_code(mut self, code: impl Into<String>) -> Self {
        self.sp_country_code = Some(code.into());
        self
    }

    /// Adds a requested level of assurance.
    #[must_use]
    pub fn level_of_assurance(mut self, loa: impl Into<String>) -> Self {
        self.levels_of_assurance.push(loa.into());
        self
    }

    /// Sets the level of assurance comparison.
    #[must_use]
    pub fn level_of_assurance_comparison(mut self, comparison: impl Into<String>) -> Self {
        self.level_of_assurance_comparison = Some(comparison.into());
        self
    }

    /// Sets the name identifier format.
    #[must_use]
    pub fn name_id_format(mut self, format: impl Into<String>) -> Self {
        self.name_id_format = Some(format.into());
        self
    }

    /// Sets the provider name.
    #[must_use]
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    /// Sets the service provider type.
    #[must_use]
    pub fn sp_type(mut self, sp_type: impl Into<String>) -> Self {
        self.sp_type = Some(sp_type.into());
        self
    }

    /// Sets the requester identifier.
    #[must_use]
    pub fn requester_id(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = Some(requester_id.into());
        self
    }

    /// Sets the requested attributes.
    #[must_use]
    pub fn requested_attributes(mut self, attributes: ImmutableAttributeMap) -> Self {
        self.requested_attributes = Some(attributes);
        self
    }

    /// Builds and validates the request.
    pub fn build(self) -> LightResult<LightRequest> {
        let request = LightRequest {
            id: self.id,
            issuer: self.issuer,
            relay_state: self.relay_state,
            citizen_country_code: self.citizen_country_code,
            sp_country_code: self.sp_country_code,
            levels_of_assurance: self.levels_of_assurance,
            level_of_assurance_comparison: self.level_of_assurance_comparison,
            name_id_format: self.name_id_format,
            provider_name: self.provider_name,
            sp_type: self.sp_type,
            requester_id: self.requester_id,
            requested_attributes: self.requested_attributes.unwrap_or_default(),
        };
        request.validate()?;
        Ok(request)
    }
}

/// Status of a light response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStatus {
    /// Whether authentication failed.
    pub failure: bool,
    /// Top level status code URI.
    pub status_code: String,
    /// Human readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Second level status code URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_status_code: Option<String>,
}

impl ResponseStatus {
    /// Successful authentication.
    #[must_use]
    pub fn success() -> Self {
        Self {
            failure: false,
            status_code: STATUS_SUCCESS.to_string(),
            status_message: None,
            sub_status_code: None,
        }
    }

    /// Failed authentication.
    #[must_use]
    pub fn failure(status_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            failure: true,
            status_code: status_code.into(),
            status_message: Some(message.into()),
            sub_status_code: None,
        }
    }

    /// Sets the second level status code.
    #[must_use]
    pub fn with_sub_status(mut self, sub_status_code: impl Into<String>) -> Self {
        self.sub_status_code = Some(sub_status_code.into());
        self
    }
}

/// Authentication response passed between a specific adapter and the node.
#[derive(Debug, Clone, PartialEq)]
pub struct LightResponse {
    /// Response identifier.
    pub id: String,
    /// Identifier of the light request this answers.
    pub in_response_to_id: String,
    /// Issuer of the light response.
    pub issuer: String,
    /// Opaque relay state.
    pub relay_state: Option<String>,
    /// Address of the authenticated user agent.
    pub ip_address: Option<String>,
    /// Subject identifier.
    pub subject: Option<String>,
    /// Subject name identifier format.
    pub subject_name_id_format: Option<String>,
    /// Level of assurance reached.
    pub level_of_assurance: Option<String>,
    /// Consent given by the citizen.
    pub consent: Option<String>,
    /// Outcome.
    pub status: ResponseStatus,
    /// Released attributes.
    pub attributes: ImmutableAttributeMap,
}

impl LightResponse {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> LightResponseBuilder {
        LightResponseBuilder::default()
    }

    /// Returns whether authentication failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.status.failure
    }

    /// Checks the mandatory fields.
    pub fn validate(&self) -> LightResult<()> {
        require("id", &self.id)?;
        require("inResponseToId", &self.in_response_to_id)?;
        require("issuer", &self.issuer)?;
        require("status.statusCode", &self.status.status_code)?;
        if !self.status.failure {
            require("subject", self.subject.as_deref().unwrap_or_default())?;
        }
        Ok(())
    }

    /// Serializes the response to `<lightResponse>` XML.
    pub fn to_xml(&self) -> LightResult<String> {
        let wire = LightResponseXml {
            id: self.id.clone(),
            in_response_to_id: self.in_response_to_id.clone(),
            issuer: self.issuer.clone(),
            relay_state: self.relay_state.clone(),
            ip_address: self.ip_address.clone(),
            subject: self.subject.clone(),
            subject_name_id_format: self.subject_name_id_format.clone(),
            level_of_assurance: self.level_of_assurance.clone(),
            consent: self.consent.clone(),
            status: self.status.clone(),
            attributes: AttributesXml::from_map(&self.attributes)?,
        };
        quick_xml::se::to_string(&wire).map_err(|e| LightError::Xml(e.to_string()))
    }

    /// Parses and validates `<lightResponse>` XML, resolving attributes in `registry`.
    pub fn from_xml(xml: &str, registry: &AttributeRegistry) -> LightResult<Self> {
        reject_doctype(xml)?;
        let wire: LightResponseXml =
            quick_xml::de::from_str(xml).map_err(|e| LightError::Xml(e.to_string()))?;
        let response = Self {
            id: wire.id,
            in_response_to_id: wire.in_response_to_id,
            issuer: wire.issuer,
            relay_state: wire.relay_state,
            ip_address: wire.ip_address,
            subject: wire.subject,
            subject_name_id_format: wire.subject_name_id_format,
            level_of_assurance: wire.level_of_assurance,
            consent: wire.consent,
            status: wire.status,
            attributes: wire.attributes.into_map(registry)?,
        };
        response.validate()?;
        Ok(response)
    }
}

/// Builder for [`LightResponse`].
#[derive(Debug, Clone, Default)]
pub struct LightResponseBuilder {
    id: String,
    in_response_to_id: String,
    issuer: String,
    relay_state: Option<String>,
    ip_address: Option<String>,
    subject: Option<String>,
    subject_name_id_format: Option<String>,
    level_of_assurance: Option<String>,
    consent: Option<String>,
    status: Option<ResponseStatus>,
    attributes: Option<ImmutableAttributeMap>,
}

impl LightResponseBuilder {
    /// Sets the identifier.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the identifier of the answered request.
    #[must_use]
    pub fn in_response_to_id(mut self, id: impl Into<String>) -> Self {
        self.in_response_to_id = id.into();
        self
    }

    /// Sets the issuer.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the relay state.
    #[must_use]
    pub fn relay_state(mut self, relay_state: impl Into<String>) -> Self {
        self.relay_state = Some(relay_state.into());
        self
    }

    /// Sets the user agent address.
    #[must_use]
    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the subject name identifier format.
    #[must_use]
    pub fn subject_name_id_format(mut self, format: impl Into<String>) -> Self {
        self.subject_name_id_format = Some(format.into());
        self
    }

    /// Sets the level of assurance reached.
    #[must_use]
    pub fn level_of_assurance(mut self, loa: impl Into<String>) -> Self {
        self.level_of_assurance = Some(loa.into());
        self
    }

    /// Sets the consent.
    #[must_use]
    pub fn consent(mut self, consent: impl Into<String>) -> Self {
        self.consent = Some(consent.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn status(mut self, status: ResponseStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the released attributes.
    #[must_use]
    pub fn attributes(mut self, attributes: ImmutableAttributeMap) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Builds and validates the response.
    pub fn build(self) -> LightResult<LightResponse> {
        let status = self
            .status
            .ok_or_else(|| LightError::Validation("status is mandatory".to_string()))?;
        let response = LightResponse {
            id: self.id,
            in_response_to_id: self.in_response_to_id,
            issuer: self.issuer,
            relay_state: self.relay_state,
            ip_address: self.ip_address,
            subject: self.subject,
            subject_name_id_format: self.subject_name_id_format,
            level_of_assurance: self.level_of_assurance,
            consent: self.consent,
            status,
            attributes: self.attributes.unwrap_or_default(),
        };
        response.validate()?;
        Ok(response)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "lightRequest", rename_all = "camelCase")]
struct LightRequestXml {
    id: String,
    issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relay_state: Option<String>,
    citizen_country_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sp_country_code: Option<String>,
    #[serde(rename = "levelOfAssurance", default, skip_serializing_if = "Vec::is_empty")]
    levels_of_assurance: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level_of_assurance_comparison: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name_id_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sp_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    requester_id: Option<String>,
    #[serde(default)]
    requested_attributes: AttributesXml,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "lightResponse", rename_all = "camelCase")]
struct LightResponseXml {
    id: String,
    in_response_to_id: String,
    issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relay_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject_name_id_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level_of_assurance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    consent: Option<String>,
    status: ResponseStatus,
    #[serde(default)]
    attributes: AttributesXml,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AttributesXml {
    #[serde(rename = "attribute", default)]
    attributes: Vec<AttributeXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AttributeXml {
    definition: String,
    #[serde(rename = "value", default)]
    values: Vec<String>,
}

impl AttributesXml {
    fn from_map(map: &ImmutableAttributeMap) -> LightResult<Self> {
        let attributes = map
            .to_wire()?
            .into_iter()
            .map(|(definition, values)| AttributeXml { definition, values })
            .collect();
        Ok(Self { attributes })
    }

    fn into_map(self, registry: &AttributeRegistry) -> LightResult<ImmutableAttributeMap> {
        let mut builder = ImmutableAttributeMap::builder();
        for attribute in self.attributes {
            let definition = registry
                .get_by_name_uri(attribute.definition.trim())
                .cloned()
                .ok_or_else(|| {
                    LightError::Validation(format!("unknown attribute {}", attribute.definition))
                })?;
            builder = if attribute.values.is_empty() {
                builder.put_empty(definition)
            } else {
                builder.put_primary_values(definition, &attribute.values)?
            };
        }
        Ok(builder.build())
    }
}
