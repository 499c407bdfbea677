//! SAML Assertion types.
//!
//! Assertions carry the authenticated subject, the level of assurance the
//! authentication reached and the attributes released for the citizen.

use chrono::{DateTime, Duration, Utc};
use eidas_core::attribute::{AttributeRegistry, ImmutableAttributeMap};
use serde::{Deserialize, Serialize};

use super::{ATTRIBUTE_NAME_FORMAT_URI, BEARER, NameId};
use crate::error::{SamlError, SamlResult};

/// SAML Assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Unique identifier for this assertion.
    pub id: String,

    /// Timestamp when this assertion was issued.
    pub issue_instant: DateTime<Utc>,

    /// Entity ID of the issuing node.
    pub issuer: String,

    /// The subject of this assertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,

    /// Conditions that must hold for the assertion to be valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,

    /// Authentication statement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authn_statement: Option<AuthnStatement>,

    /// Attribute statement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_statement: Option<AttributeStatement>,
}

impl Assertion {
    /// Creates a new assertion.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: eidas_crypto::random::generate_saml_id(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            subject: None,
            conditions: None,
            authn_statement: None,
            attribute_statement: None,
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Sets the authentication statement.
    #[must_use]
    pub fn with_authn_statement(mut self, statement: AuthnStatement) -> Self {
        self.authn_statement = Some(statement);
        self
    }

    /// Sets the attribute statement.
    #[must_use]
    pub fn with_attribute_statement(mut self, statement: AttributeStatement) -> Self {
        self.attribute_statement = Some(statement);
        self
    }

    /// Returns the level of assurance of the authentication statement.
    #[must_use]
    pub fn level_of_assurance(&self) -> Option<&str> {
        self.authn_statement
            .as_ref()
            .map(|s| s.authn_context_class_ref.as_str())
    }

    /// Returns the first bearer subject confirmation.
    #[must_use]
    pub fn bearer_confirmation(&self) -> Option<&SubjectConfirmation> {
        self.subject
            .as_ref()?
            .subject_confirmations
            .iter()
            .find(|c| c.method == BEARER)
    }
}

/// Subject of an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// The name identifier for the subject.
    pub name_id: NameId,

    /// Subject confirmations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_confirmations: Vec<SubjectConfirmation>,
}

impl Subject {
    /// Creates a new subject with a name ID.
    #[must_use]
    pub const fn new(name_id: NameId) -> Self {
        Self {
            name_id,
            subject_confirmations: Vec::new(),
        }
    }

    /// Adds a subject confirmation.
    #[must_use]
    pub fn with_confirmation(mut self, confirmation: SubjectConfirmation) -> Self {
        self.subject_confirmations.push(confirmation);
        self
    }
}

/// Subject confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectConfirmation {
    /// The confirmation method.
    pub method: String,

    /// Confirmation data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SubjectConfirmationData>,
}

impl SubjectConfirmation {
    /// Creates a bearer confirmation.
    #[must_use]
    pub fn bearer(data: SubjectConfirmationData) -> Self {
        Self {
            method: BEARER.to_string(),
            data: Some(data),
        }
    }
}

/// Subject confirmation data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectConfirmationData {
    /// The request ID this assertion answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// Time after which the subject can no longer be confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// The location the assertion may be presented to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,

    /// IP address of the citizen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl SubjectConfirmationData {
    /// Creates confirmation data answering `request_id` at `recipient`.
    #[must_use]
    pub fn for_request(
        request_id: impl Into<String>,
        recipient: impl Into<String>,
        validity: Duration,
    ) -> Self {
        Self {
            in_response_to: Some(request_id.into()),
            recipient: Some(recipient.into()),
            not_on_or_after: Some(Utc::now() + validity),
            address: None,
        }
    }
}

/// Conditions for assertion validity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    /// Time before which the assertion is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// Time at or after which the assertion is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Audiences of the audience restriction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,

    /// One-time use condition.
    #[serde(default)]
    pub one_time_use: bool,
}

impl Conditions {
    /// Creates conditions valid from now for `validity`.
    #[must_use]
    pub fn with_validity(validity: Duration) -> Self {
        let now = Utc::now();
        Self {
            not_before: Some(now),
            not_on_or_after: Some(now + validity),
            audiences: Vec::new(),
            one_time_use: true,
        }
    }

    /// Adds an audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audiences.push(audience.into());
        self
    }
}

/// Authentication statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnStatement {
    /// The time of authentication.
    pub authn_instant: DateTime<Utc>,

    /// Address of the citizen's user agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_locality_address: Option<String>,

    /// Level of assurance reached.
    pub authn_context_class_ref: String,
}

impl AuthnStatement {
    /// Creates a statement for the given level of assurance.
    #[must_use]
    pub fn new(level_of_assurance: impl Into<String>) -> Self {
        Self {
            authn_instant: Utc::now(),
            subject_locality_address: None,
            authn_context_class_ref: level_of_assurance.into(),
        }
    }

    /// Sets the subject locality address.
    #[must_use]
    pub fn with_locality(mut self, address: impl Into<String>) -> Self {
        self.subject_locality_address = Some(address.into());
        self
    }
}

/// Attribute statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeStatement {
    /// List of attributes.
    pub attributes: Vec<Attribute>,
}

impl AttributeStatement {
    /// Marshals an attribute map into SAML attributes.
    pub fn from_attribute_map(map: &ImmutableAttributeMap) -> SamlResult<Self> {
        let mut attributes = Vec::with_capacity(map.len());
        for (definition, values) in map.iter() {
            let marshaller = definition.marshaller();
            let values = values
                .iter()
                .map(|v| {
                    Ok(AttributeValueEntry {
                        value: marshaller.marshal(v)?,
                        latin_script: !v.is_non_latin_script_alternate_version(),
                    })
                })
                .collect::<SamlResult<Vec<_>>>()?;
            attributes.push(Attribute {
                name: definition.name_uri().to_string(),
                name_format: ATTRIBUTE_NAME_FORMAT_URI.to_string(),
                friendly_name: Some(definition.friendly_name().to_string()),
                values,
            });
        }
        Ok(Self { attributes })
    }

    /// Unmarshals the attributes against `registry`.
    ///
    /// Unknown attribute names are rejected.
    pub fn to_attribute_map(&self, registry: &AttributeRegistry) -> SamlResult<ImmutableAttributeMap> {
        let mut builder = ImmutableAttributeMap::builder();
        for attribute in &self.attributes {
            let definition = registry.get_by_name_uri(&attribute.name).ok_or_else(|| {
                SamlError::Attribute(format!("unknown attribute {}", attribute.name))
            })?;
            let marshaller = definition.marshaller();
            let values = attribute
                .values
                .iter()
                .map(|v| marshaller.unmarshal(&v.value, !v.latin_script))
                .collect::<eidas_core::Result<Vec<_>>>()?;
            builder = builder.put(definition.clone(), values);
        }
        Ok(builder.build())
    }
}

/// SAML Attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// The attribute name URI.
    pub name: String,

    /// The format of the attribute name.
    pub name_format: String,

    /// A human-readable name for the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// The attribute values.
    pub values: Vec<AttributeValueEntry>,
}

/// One `saml2:AttributeValue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValueEntry {
    /// Marshalled value.
    pub value: String,
    /// False for the transliterated alternative of a non-latin value.
    pub latin_script: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidas_core::attribute::{AttributeValue, eidas_core_registry};

    const FAMILY_NAME: &str = "http://eidas.europa.eu/attributes/naturalperson/CurrentFamilyName";

    #[test]
    fn assertion_creation() {
        let assertion = Assertion::new("https://proxy.example.eu/metadata")
            .with_subject(
                Subject::new(NameId::persistent("CA/BE/12345")).with_confirmation(
                    SubjectConfirmation::bearer(SubjectConfirmationData::for_request(
                        "_req",
                        "https://connector.example.eu/ColleagueResponse",
                        Duration::minutes(5),
                    )),
                ),
            )
            .with_conditions(
                Conditions::with_validity(Duration::minutes(5))
                    .with_audience("https://connector.example.eu/metadata"),
            )
            .with_authn_statement(AuthnStatement::new("http://eidas.europa.eu/LoA/high"));

        assert!(assertion.id.starts_with('_'));
        assert_eq!(
            assertion.level_of_assurance(),
            Some("http://eidas.europa.eu/LoA/high")
        );
        let bearer = assertion.bearer_confirmation().unwrap();
        assert_eq!(
            bearer.data.as_ref().unwrap().in_response_to.as_deref(),
            Some("_req")
        );
    }

    #[test]
    fn attribute_statement_keeps_transliteration_flag() {
        let registry = eidas_core_registry();
        let definition = registry.get_by_name_uri(FAMILY_NAME).unwrap().clone();
        let map = ImmutableAttributeMap::builder()
            .put(
                definition,
                [
                    AttributeValue::non_latin("Παπαδόπουλος"),
                    AttributeValue::string("Papadopoulos"),
                ],
            )
            .build();

        let statement = AttributeStatement::from_attribute_map(&map).unwrap();
        assert_eq!(statement.attributes.len(), 1);
        let values = &statement.attributes[0].values;
        assert_eq!(values.len(), 2);
        assert!(!values[0].latin_script);
        assert!(values[1].latin_script);

        let back = statement.to_attribute_map(&registry).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let statement = AttributeStatement {
            attributes: vec![Attribute {
                name: "urn:unknown".to_string(),
                name_format: ATTRIBUTE_NAME_FORMAT_URI.to_string(),
                friendly_name: None,
                values: Vec::new(),
            }],
        };
        assert!(statement.to_attribute_map(&eidas_core_registry()).is_err());
    }
}
