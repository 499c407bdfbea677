//! Attribute definitions.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::value::ValueMarshaller;
use crate::error::{Error, Result};

/// Kind of subject an attribute describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersonType {
    /// Natural person.
    NaturalPerson,
    /// Legal person.
    LegalPerson,
    /// Natural person acting as representative.
    RepresentativeNaturalPerson,
    /// Legal person acting as representative.
    RepresentativeLegalPerson,
}

impl PersonType {
    /// Returns the configuration value.
    #[must_use]
    pub const fn value(self) -> &'static str {
        match self {
            Self::NaturalPerson => "NaturalPerson",
            Self::LegalPerson => "LegalPerson",
            Self::RepresentativeNaturalPerson => "RepresentativeNaturalPerson",
            Self::RepresentativeLegalPerson => "RepresentativeLegalPerson",
        }
    }
}

impl FromStr for PersonType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NaturalPerson" => Ok(Self::NaturalPerson),
            "LegalPerson" => Ok(Self::LegalPerson),
            "RepresentativeNaturalPerson" => Ok(Self::RepresentativeNaturalPerson),
            "RepresentativeLegalPerson" => Ok(Self::RepresentativeLegalPerson),
            other => Err(Error::Validation(format!("unknown person type '{other}'"))),
        }
    }
}

/// Qualified XML schema type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct XmlType {
    /// Namespace URI.
    pub namespace_uri: String,
    /// Local part.
    pub local_part: String,
    /// Namespace prefix.
    pub prefix: String,
}

impl XmlType {
    /// Creates an XML type.
    #[must_use]
    pub fn new(
        namespace_uri: impl Into<String>,
        local_part: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            namespace_uri: namespace_uri.into(),
            local_part: local_part.into(),
            prefix: prefix.into(),
        }
    }
}

impl fmt::Display for XmlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace_uri, self.local_part)
    }
}

/// Immutable attribute definition.
///
/// Definitions are equal, hashed and ordered by their name URI only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    name_uri: String,
    friendly_name: String,
    person_type: PersonType,
    required: bool,
    transliteration_mandatory: bool,
    unique_identifier: bool,
    xml_type: XmlType,
    marshaller: ValueMarshaller,
}

impl AttributeDefinition {
    /// Starts building a definition.
    #[must_use]
    pub fn builder() -> AttributeDefinitionBuilder {
        AttributeDefinitionBuilder::default()
    }

    /// Definition from the built-in eIDAS data set; inputs are known to be valid.
    pub(super) fn predefined(
        name_uri: &str,
        friendly_name: &str,
        person_type: PersonType,
        required: bool,
        unique_identifier: bool,
        xml_type: XmlType,
        marshaller: ValueMarshaller,
    ) -> Self {
        Self {
            name_uri: name_uri.to_string(),
            friendly_name: friendly_name.to_string(),
            person_type,
            required,
            transliteration_mandatory: false,
            unique_identifier,
            xml_type,
            marshaller,
        }
    }

    /// Returns the name URI.
    #[must_use]
    pub fn name_uri(&self) -> &str {
        &self.name_uri
    }

    /// Returns the friendly name.
    #[must_use]
    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// Returns the person type.
    #[must_use]
    pub const fn person_type(&self) -> PersonType {
        self.person_type
    }

    /// Returns whether the attribute is mandatory.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns whether a latin transliteration must accompany non-latin values.
    #[must_use]
    pub const fn is_transliteration_mandatory(&self) -> bool {
        self.transliteration_mandatory
    }

    /// Returns whether the attribute uniquely identifies the subject.
    #[must_use]
    pub const fn is_unique_identifier(&self) -> bool {
        self.unique_identifier
    }

    /// Returns the XML type.
    #[must_use]
    pub const fn xml_type(&self) -> &XmlType {
        &self.xml_type
    }

    /// Returns the value marshaller.
    #[must_use]
    pub const fn marshaller(&self) -> ValueMarshaller {
        self.marshaller
    }
}

impl PartialEq for AttributeDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name_uri == other.name_uri
    }
}

impl Eq for AttributeDefinition {}

impl Hash for AttributeDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name_uri.hash(state);
    }
}

impl PartialOrd for AttributeDefinition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AttributeDefinition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name_uri.cmp(&other.name_uri)
    }
}

impl fmt::Display for AttributeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AttributeDefinition{{nameUri='{}', friendlyName='{}', personType={}, required={}, \
             transliterationMandatory={}, uniqueIdentifier={}, xmlType='{}', marshaller={:?}}}",
            self.name_uri,
            self.friendly_name,
            self.person_type.value(),
            self.required,
            self.transliteration_mandatory,
            self.unique_identifier,
            self.xml_type,
            self.marshaller
        )
    }
}

/// Builder for [`AttributeDefinition`].
#[derive(Debug, Clone, Default)]
pub struct AttributeDefinitionBuilder {
    name_uri: Option<String>,
    friendly_name: Option<String>,
    person_type: Option<PersonType>,
    required: bool,
    transliteration_mandatory: bool,
    unique_identifier: bool,
    xml_type: Option<XmlType>,
    marshaller: Option<ValueMarshaller>,
}

impl AttributeDefinitionBuilder {
    /// Sets the name URI.
    #[must_use]
    pub fn name_uri(mut self, name_uri: impl Into<String>) -> Self {
        self.name_uri = Some(name_uri.into());
        self
    }

    /// Sets the friendly name.
    #[must_use]
    pub fn friendly_name(mut self, friendly_name: impl Into<String>) -> Self {
        self.friendly_name = Some(friendly_name.into());
        self
    }

    /// Sets the person type.
    #[must_use]
    pub const fn person_type(mut self, person_type: PersonType) -> Self {
        self.person_type = Some(person_type);
        self
    }

    /// Marks the attribute as mandatory.
    #[must_use]
    pub const fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Requires a latin transliteration for non-latin values.
    #[must_use]
    pub const fn transliteration_mandatory(mut self, mandatory: bool) -> Self {
        self.transliteration_mandatory = mandatory;
        self
    }

    /// Marks the attribute as a unique identifier.
    #[must_use]
    pub const fn unique_identifier(mut self, unique: bool) -> Self {
        self.unique_identifier = unique;
        self
    }

    /// Sets the XML type.
    #[must_use]
    pub fn xml_type(
        mut self,
        namespace_uri: impl Into<String>,
        local_part: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        self.xml_type = Some(XmlType::new(namespace_uri, local_part, prefix));
        self
    }

    /// Sets the value marshaller.
    #[must_use]
    pub const fn marshaller(mut self, marshaller: ValueMarshaller) -> Self {
        self.marshaller = Some(marshaller);
        self
    }

    /// Validates the collected fields and builds the definition.
    pub fn build(self) -> Result<AttributeDefinition> {
        let name_uri = self
            .name_uri
            .ok_or_else(|| Error::Validation("nameUri cannot be null".into()))?;
        require_absolute_uri("nameUri", &name_uri)?;

        let friendly_name = self
            .friendly_name
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Validation("friendlyName cannot be null, empty or blank".into()))?;

        let person_type = self
            .person_type
            .ok_or_else(|| Error::Validation("personType cannot be null".into()))?;

        let xml_type = self
            .xml_type
            .ok_or_else(|| Error::Validation("xmlType cannot be null".into()))?;
        require_absolute_uri("xmlType.namespaceURI", &xml_type.namespace_uri)?;
        if xml_type.local_part.trim().is_empty() {
            return Err(Error::Validation(
                "xmlType.localPart cannot be null, empty or blank".into(),
            ));
        }
        if xml_type.prefix.trim().is_empty() {
            return Err(Error::Validation(
                "xmlType.prefix cannot be null, empty or blank".into(),
            ));
        }

        Ok(AttributeDefinition {
            name_uri,
            friendly_name,
            person_type,
            required: self.required,
            transliteration_mandatory: self.transliteration_mandatory,
            unique_identifier: self.unique_identifier,
            xml_type,
            marshaller: self.marshaller.unwrap_or(ValueMarshaller::String),
        })
    }
}

fn require_absolute_uri(field: &str, value: &str) -> Result<()> {
    match url::Url::parse(value) {
        Ok(_) => Ok(()),
        Err(url::ParseError::RelativeUrlWithoutBase) => Err(Error::Validation(format!(
            "{field} \"{value}\" is not an absolute URI"
        ))),
        Err(e) => Err(Error::Validation(format!(
            "{field} \"{value}\" is not a valid URI: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NATURAL: &str = "http://eidas.europa.eu/attributes/naturalperson";

    fn family_name() -> AttributeDefinition {
        AttributeDefinition::builder()
            .name_uri("http://eidas.europa.eu/attributes/naturalperson/CurrentFamilyName")
            .friendly_name("FamilyName")
            .person_type(PersonType::NaturalPerson)
            .required(true)
            .xml_type(NATURAL, "CurrentFamilyNameType", "eidas-natural")
            .build()
            .unwrap()
    }

    #[test]
    fn builder_sets_all_fields() {
        let def = family_name();
        assert_eq!(def.friendly_name(), "FamilyName");
        assert!(def.is_required());
        assert!(!def.is_unique_identifier());
        assert_eq!(def.person_type(), PersonType::NaturalPerson);
        assert_eq!(
            def.xml_type().to_string(),
            "{http://eidas.europa.eu/attributes/naturalperson}CurrentFamilyNameType"
        );
        assert_eq!(def.marshaller(), ValueMarshaller::String);
    }

    #[test]
    fn equality_uses_name_uri_only() {
        let other = AttributeDefinition::builder()
            .name_uri("http://eidas.europa.eu/attributes/naturalperson/CurrentFamilyName")
            .friendly_name("Surname")
            .person_type(PersonType::LegalPerson)
            .xml_type(NATURAL, "OtherType", "x")
            .build()
            .unwrap();
        assert_eq!(family_name(), other);
    }

    #[test]
    fn relative_name_uri_is_rejected() {
        let err = AttributeDefinition::builder()
            .name_uri("CurrentFamilyName")
            .friendly_name("FamilyName")
            .person_type(PersonType::NaturalPerson)
            .xml_type(NATURAL, "CurrentFamilyNameType", "eidas-natural")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("not an absolute URI"));
    }

    #[test]
    fn relative_xml_namespace_is_rejected() {
        let result = AttributeDefinition::builder()
            .name_uri("http://eidas.europa.eu/attributes/naturalperson/CurrentFamilyName")
            .friendly_name("FamilyName")
            .person_type(PersonType::NaturalPerson)
            .xml_type("naturalperson", "CurrentFamilyNameType", "eidas-natural")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn blank_friendly_name_is_rejected() {
        let result = AttributeDefinition::builder()
            .name_uri("http://eidas.europa.eu/attributes/naturalperson/CurrentFamilyName")
            .friendly_name("  ")
            .person_type(PersonType::NaturalPerson)
            .xml_type(NATURAL, "CurrentFamilyNameType", "eidas-natural")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn ordering_follows_name_uri() {
        let given = AttributeDefinition::builder()
            .name_uri("http://eidas.europa.eu/attributes/naturalperson/CurrentGivenName")
            .friendly_name("FirstName")
            .person_type(PersonType::NaturalPerson)
            .xml_type(NATURAL, "CurrentGivenNameType", "eidas-natural")
            .build()
            .unwrap();
        assert!(family_name() < given);
    }
}
