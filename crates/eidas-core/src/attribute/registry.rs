//! Attribute definition registry.

use std::collections::BTreeMap;

use super::definition::{AttributeDefinition, PersonType, XmlType};
use super::value::ValueMarshaller;
use crate::error::{Error, Result};

/// Namespace of natural person attributes.
pub const NATURAL_PERSON_NS: &str = "http://eidas.europa.eu/attributes/naturalperson";
/// Namespace of legal person attributes.
pub const LEGAL_PERSON_NS: &str = "http://eidas.europa.eu/attributes/legalperson";

/// Set of attribute definitions, unique by name URI.
#[derive(Debug, Clone, Default)]
pub struct AttributeRegistry {
    definitions: BTreeMap<String, AttributeDefinition>,
}

impl AttributeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from definitions, failing on duplicate name URIs.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = AttributeDefinition>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    /// Adds a definition.
    ///
    /// Returns [`Error::AlreadyExists`] if the name URI is already registered.
    pub fn register(&mut self, definition: AttributeDefinition) -> Result<()> {
        let key = definition.name_uri().to_string();
        if self.definitions.contains_key(&key) {
            return Err(Error::AlreadyExists(format!(
                "attribute definition {key} is already registered"
            )));
        }
        self.definitions.insert(key, definition);
        Ok(())
    }

    /// Adds every definition of `other`, failing on the first duplicate.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        for definition in other.definitions.values() {
            self.register(definition.clone())?;
        }
        Ok(())
    }

    /// Looks up a definition by name URI.
    #[must_use]
    pub fn get_by_name_uri(&self, name_uri: &str) -> Option<&AttributeDefinition> {
        self.definitions.get(name_uri)
    }

    /// Looks up definitions sharing a friendly name.
    #[must_use]
    pub fn get_by_friendly_name(&self, friendly_name: &str) -> Vec<&AttributeDefinition> {
        self.definitions
            .values()
            .filter(|d| d.friendly_name() == friendly_name)
            .collect()
    }

    /// Returns whether a name URI is registered.
    #[must_use]
    pub fn contains(&self, name_uri: &str) -> bool {
        self.definitions.contains_key(name_uri)
    }

    /// Iterates over definitions in name URI order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.definitions.values()
    }

    /// Returns the number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Returns a registry holding the eIDAS minimum data set.
#[must_use]
pub fn eidas_core_registry() -> AttributeRegistry {
    use PersonType::{LegalPerson, NaturalPerson};
    use ValueMarshaller as M;

    let natural = |name: &str, friendly: &str, required, unique, marshaller| {
        AttributeDefinition::predefined(
            &format!("{NATURAL_PERSON_NS}/{name}"),
            friendly,
            NaturalPerson,
            required,
            unique,
            XmlType::new(NATURAL_PERSON_NS, format!("{name}Type"), "eidas-natural"),
            marshaller,
        )
    };
    let legal = |name: &str, friendly: &str, required, unique, marshaller| {
        AttributeDefinition::predefined(
            &format!("{LEGAL_PERSON_NS}/{name}"),
            friendly,
            LegalPerson,
            required,
            unique,
            XmlType::new(LEGAL_PERSON_NS, format!("{name}Type"), "eidas-legal"),
            marshaller,
        )
    };

    let definitions = [
        natural("PersonIdentifier", "PersonIdentifier", true, true, M::LiteralString),
        natural("CurrentFamilyName", "FamilyName", true, false, M::LiteralString),
        natural("CurrentGivenName", "FirstName", true, false, M::LiteralString),
        natural("DateOfBirth", "DateOfBirth", true, false, M::Date),
        natural("BirthName", "BirthName", false, false, M::LiteralString),
        natural("PlaceOfBirth", "PlaceOfBirth", false, false, M::String),
        natural("CurrentAddress", "CurrentAddress", false, false, M::PostalAddress),
        natural("Gender", "Gender", false, false, M::Gender),
        legal("LegalPersonIdentifier", "LegalPersonIdentifier", true, true, M::String),
        legal("LegalName", "LegalName", true, false, M::LiteralString),
        legal("LegalPersonAddress", "LegalAddress", false, false, M::PostalAddress),
        legal("VATRegistrationNumber", "VATRegistration", false, false, M::String),
        legal("TaxReference", "TaxReference", false, false, M::String),
        legal("D-2012-17-EUIdentifier", "D-2012-17-EUIdentifier", false, false, M::String),
        legal("LEI", "LEI", false, false, M::String),
        legal("EORI", "EORI", false, false, M::String),
        legal("SEED", "SEED", false, false, M::String),
        legal("SIC", "SIC", false, false, M::String),
    ];

    AttributeRegistry {
        definitions: definitions
            .into_iter()
            .map(|d| (d.name_uri().to_string(), d))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_registry_contains_minimum_data_set() {
        let registry = eidas_core_registry();
        assert_eq!(registry.len(), 18);

        let id = registry
            .get_by_name_uri("http://eidas.europa.eu/attributes/naturalperson/PersonIdentifier")
            .unwrap();
        assert!(id.is_unique_identifier());
        assert!(id.is_required());

        let dob = &registry.get_by_friendly_name("DateOfBirth")[0];
        assert_eq!(dob.marshaller(), ValueMarshaller::Date);
        assert_eq!(dob.xml_type().prefix, "eidas-natural");
    }

    #[test]
    fn duplicate_name_uri_is_rejected() {
        let mut registry = eidas_core_registry();
        let duplicate = registry
            .get_by_friendly_name("FamilyName")
            .first()
            .map(|d| (*d).clone())
            .unwrap();
        let err = registry.register(duplicate).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(registry.len(), 18);
    }

    #[test]
    fn merge_into_empty_registry() {
        let mut registry = AttributeRegistry::new();
        assert!(registry.is_empty());
        registry.merge(&eidas_core_registry()).unwrap();
        assert!(registry.contains("http://eidas.europa.eu/attributes/legalperson/LEI"));
        assert!(registry.merge(&eidas_core_registry()).is_err());
    }
}
