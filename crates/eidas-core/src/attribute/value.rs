//! Typed attribute values and their string marshallers.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Date format used by eIDAS date attributes.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Gender values defined by the eIDAS natural person schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Not specified.
    Unspecified,
}

impl Gender {
    /// Returns the schema value.
    #[must_use]
    pub const fn value(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Unspecified => "Unspecified",
        }
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Male" => Ok(Self::Male),
            "Female" => Ok(Self::Female),
            "Unspecified" | "Not Specified" => Ok(Self::Unspecified),
            other => Err(Error::AttributeValue(format!("unknown gender value '{other}'"))),
        }
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Text value, optionally flagged as the non-latin script version.
    String {
        /// The text.
        value: String,
        /// Whether this is the non-latin script alternate version.
        non_latin_script_alternate_version: bool,
    },
    /// Calendar date.
    Date(NaiveDate),
    /// Gender.
    Gender(Gender),
    /// Boolean.
    Boolean(bool),
    /// Integer.
    Integer(i64),
}

impl AttributeValue {
    /// Creates a latin script string value.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String {
            value: value.into(),
            non_latin_script_alternate_version: false,
        }
    }

    /// Creates a non-latin script string value.
    #[must_use]
    pub fn non_latin(value: impl Into<String>) -> Self {
        Self::String {
            value: value.into(),
            non_latin_script_alternate_version: true,
        }
    }

    /// Returns whether the value is a non-latin script alternate version.
    #[must_use]
    pub const fn is_non_latin_script_alternate_version(&self) -> bool {
        matches!(
            self,
            Self::String {
                non_latin_script_alternate_version: true,
                ..
            }
        )
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String { value, .. } => f.write_str(value),
            Self::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            Self::Gender(gender) => f.write_str(gender.value()),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
        }
    }
}

/// Converts attribute values to and from their wire string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueMarshaller {
    /// Plain string, the non-latin flag is dropped.
    String,
    /// String that keeps the non-latin script flag.
    LiteralString,
    /// `yyyy-MM-dd` date.
    Date,
    /// Gender.
    Gender,
    /// `true` / `false`.
    Boolean,
    /// Decimal integer.
    Integer,
    /// Postal address XML fragment, base64 encoded on the wire.
    PostalAddress,
}

impl ValueMarshaller {
    /// Marshals a value to its wire string.
    pub fn marshal(self, value: &AttributeValue) -> Result<String> {
        match (self, value) {
            (Self::String | Self::LiteralString, AttributeValue::String { value, .. }) => {
                Ok(value.clone())
            }
            (Self::PostalAddress, AttributeValue::String { value, .. }) => {
                Ok(STANDARD.encode(value.as_bytes()))
            }
            (Self::Date, AttributeValue::Date(date)) => Ok(date.format(DATE_FORMAT).to_string()),
            (Self::Gender, AttributeValue::Gender(gender)) => Ok(gender.value().to_string()),
            (Self::Boolean, AttributeValue::Boolean(b)) => Ok(b.to_string()),
            (Self::Integer, AttributeValue::Integer(i)) => Ok(i.to_string()),
            (marshaller, value) => Err(Error::AttributeValue(format!(
                "{marshaller:?} marshaller cannot marshal {value:?}"
            ))),
        }
    }

    /// Unmarshals a wire string into a typed value.
    pub fn unmarshal(self, raw: &str, non_latin: bool) -> Result<AttributeValue> {
        match self {
            Self::String => Ok(AttributeValue::string(raw)),
            Self::LiteralString => Ok(AttributeValue::String {
                value: raw.to_string(),
                non_latin_script_alternate_version: non_latin,
            }),
            Self::PostalAddress => {
                // Plain text addresses are accepted as they are.
                let decoded = STANDARD
                    .decode(raw.trim())
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .unwrap_or_else(|| raw.to_string());
                Ok(AttributeValue::string(decoded))
            }
            Self::Date => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
                .map(AttributeValue::Date)
                .map_err(|e| Error::AttributeValue(format!("invalid date '{raw}': {e}"))),
            Self::Gender => raw.trim().parse().map(AttributeValue::Gender),
            Self::Boolean => match raw.trim() {
                "true" | "1" => Ok(AttributeValue::Boolean(true)),
                "false" | "0" => Ok(AttributeValue::Boolean(false)),
                other => Err(Error::AttributeValue(format!("invalid boolean '{other}'"))),
            },
            Self::Integer => raw
                .trim()
                .parse()
                .map(AttributeValue::Integer)
                .map_err(|e| Error::AttributeValue(format!("invalid integer '{raw}': {e}"))),
        }
    }
}
