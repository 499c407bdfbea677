//! SAML Name ID types.

use serde::{Deserialize, Serialize};

use super::NameIdFormat;

/// Identifier of the subject of an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    /// The identifier value.
    pub value: String,

    /// The format URI of the identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// The node that qualifies the name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,
}

impl NameId {
    /// Creates a name ID without a format.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            name_qualifier: None,
        }
    }

    /// Creates a persistent name ID.
    #[must_use]
    pub fn persistent(value: impl Into<String>) -> Self {
        Self::new(value).with_format(NameIdFormat::Persistent)
    }

    /// Creates a transient name ID.
    #[must_use]
    pub fn transient(value: impl Into<String>) -> Self {
        Self::new(value).with_format(NameIdFormat::Transient)
    }

    /// Sets the format.
    #[must_use]
    pub fn with_format(mut self, format: NameIdFormat) -> Self {
        self.format = Some(format.uri().to_string());
        self
    }

    /// Sets the name qualifier.
    #[must_use]
    pub fn with_name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.name_qualifier = Some(qualifier.into());
        self
    }

    /// Returns the parsed format; unknown or absent formats are unspecified.
    #[must_use]
    pub fn parsed_format(&self) -> NameIdFormat {
        self.format
            .as_deref()
            .and_then(NameIdFormat::from_uri)
            .unwrap_or_default()
    }
}

/// Name ID policy of an authentication request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameIdPolicy {
    /// The requested name ID format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Whether a new identifier may be created.
    #[serde(default)]
    pub allow_create: bool,
}

impl NameIdPolicy {
    /// Creates a policy requesting a specific format.
    #[must_use]
    pub fn with_format(format: NameIdFormat) -> Self {
        Self {
            format: Some(format.uri().to_string()),
            allow_create: true,
        }
    }

    /// Returns the parsed name ID format.
    #[must_use]
    pub fn parsed_format(&self) -> Option<NameIdFormat> {
        self.format.as_deref().and_then(NameIdFormat::from_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_id_formats() {
        assert_eq!(NameId::persistent("BE/CA/1").parsed_format(), NameIdFormat::Persistent);
        assert_eq!(NameId::transient("x").parsed_format(), NameIdFormat::Transient);
        assert_eq!(NameId::new("x").parsed_format(), NameIdFormat::Unspecified);
    }

    #[test]
    fn name_id_policy_format() {
        let policy = NameIdPolicy::with_format(NameIdFormat::Persistent);
        assert_eq!(policy.parsed_format(), Some(NameIdFormat::Persistent));
        assert!(policy.allow_create);
    }
}
