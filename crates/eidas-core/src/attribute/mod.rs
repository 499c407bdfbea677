//! eIDAS attribute model.
//!
//! Attributes are described by immutable [`AttributeDefinition`]s, grouped in an
//! [`AttributeRegistry`] that is unique by name URI, and carried in messages as
//! an [`ImmutableAttributeMap`] of typed [`AttributeValue`]s.
//!
//! ## Components
//!
//! - [`definition`] - definitions, person types and XML types
//! - [`value`] - typed values and their string marshallers
//! - [`registry`] - definition registry and the eIDAS minimum data set
//! - [`map`] - immutable attribute maps and their builder

pub mod definition;
pub mod map;
pub mod registry;
pub mod value;

pub use definition::{AttributeDefinition, AttributeDefinitionBuilder, PersonType, XmlType};
pub use map::{ImmutableAttributeMap, ImmutableAttributeMapBuilder};
pub use registry::{AttributeRegistry, eidas_core_registry};
pub use value::{AttributeValue, Gender, ValueMarshaller};
