//! Immutable attribute maps.

use std::collections::BTreeMap;

use super::definition::AttributeDefinition;
use super::value::AttributeValue;
use crate::error::Result;

/// Map from attribute definition to its ordered, distinct values.
///
/// Instances are created through [`ImmutableAttributeMap::builder`] and never
/// change afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImmutableAttributeMap {
    entries: BTreeMap<AttributeDefinition, Vec<AttributeValue>>,
}

impl ImmutableAttributeMap {
    /// Starts building a map.
    #[must_use]
    pub fn builder() -> ImmutableAttributeMapBuilder {
        ImmutableAttributeMapBuilder::default()
    }

    /// Returns a map holding no attribute.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a builder pre-filled with this map.
    #[must_use]
    pub fn to_builder(&self) -> ImmutableAttributeMapBuilder {
        ImmutableAttributeMapBuilder {
            entries: self.entries.clone(),
        }
    }

    /// Returns the values of a definition.
    #[must_use]
    pub fn get_values(&self, definition: &AttributeDefinition) -> Option<&[AttributeValue]> {
        self.entries.get(definition).map(Vec::as_slice)
    }

    /// Returns the first value of a definition.
    #[must_use]
    pub fn first_value(&self, definition: &AttributeDefinition) -> Option<&AttributeValue> {
        self.entries.get(definition).and_then(|v| v.first())
    }

    /// Looks up an entry by name URI.
    #[must_use]
    pub fn get_by_name_uri(
        &self,
        name_uri: &str,
    ) -> Option<(&AttributeDefinition, &[AttributeValue])> {
        self.entries
            .iter()
            .find(|(d, _)| d.name_uri() == name_uri)
            .map(|(d, v)| (d, v.as_slice()))
    }

    /// Returns the definitions sharing a friendly name.
    #[must_use]
    pub fn get_definitions_by_friendly_name(&self, friendly_name: &str) -> Vec<&AttributeDefinition> {
        self.entries
            .keys()
            .filter(|d| d.friendly_name() == friendly_name)
            .collect()
    }

    /// Iterates over definitions.
    pub fn definitions(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.entries.keys()
    }

    /// Iterates over entries.
    pub fn iter(&self) -> impl Iterator<Item = (&AttributeDefinition, &[AttributeValue])> {
        self.entries.iter().map(|(d, v)| (d, v.as_slice()))
    }

    /// Returns the number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Marshals every value to its wire form, keyed by name URI.
    pub fn to_wire(&self) -> Result<Vec<(String, Vec<String>)>> {
        self.entries
            .iter()
            .map(|(definition, values)| {
                let marshaller = definition.marshaller();
                let wire = values
                    .iter()
                    .map(|v| marshaller.marshal(v))
                    .collect::<Result<Vec<_>>>()?;
                Ok((definition.name_uri().to_string(), wire))
            })
            .collect()
    }
}

/// Builder for [`ImmutableAttributeMap`].
#[derive(Debug, Clone, Default)]
pub struct ImmutableAttributeMapBuilder {
    entries: BTreeMap<AttributeDefinition, Vec<AttributeValue>>,
}

impl ImmutableAttributeMapBuilder {
    /// Adds values to a definition, skipping values already present.
    #[must_use]
    pub fn put(
        mut self,
        definition: AttributeDefinition,
        values: impl IntoIterator<Item = AttributeValue>,
    ) -> Self {
        let entry = self.entries.entry(definition).or_default();
        for value in values {
            if !entry.contains(&value) {
                entry.push(value);
            }
        }
        self
    }

    /// Adds a single value.
    #[must_use]
    pub fn put_value(self, definition: AttributeDefinition, value: AttributeValue) -> Self {
        self.put(definition, [value])
    }

    /// Adds a definition without values (as in a request).
    #[must_use]
    pub fn put_empty(mut self, definition: AttributeDefinition) -> Self {
        self.entries.entry(definition).or_default();
        self
    }

    /// Unmarshals wire strings with the definition's marshaller and adds them.
    pub fn put_primary_values<S: AsRef<str>>(
        self,
        definition: AttributeDefinition,
        raw_values: &[S],
    ) -> Result<Self> {
        let marshaller = definition.marshaller();
        let values = raw_values
            .iter()
            .map(|raw| marshaller.unmarshal(raw.as_ref(), false))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.put(definition, values))
    }

    /// Adds every entry of another map.
    #[must_use]
    pub fn put_all(mut self, other: &ImmutableAttributeMap) -> Self {
        for (definition, values) in &other.entries {
            self = self.put(definition.clone(), values.iter().cloned());
        }
        self
    }

    /// Builds the immutable map.
    #[must_use]
    pub fn build(self) -> ImmutableAttributeMap {
        ImmutableAttributeMap {
            entries: self.entries,
        }
    }
}
