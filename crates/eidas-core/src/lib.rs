//! # eidas-core
//!
//! Core utilities, configuration, error handling and the attribute model for
//! the eIDAS node.
//!
//! This crate provides foundational types used across all other eIDAS crates.
//!
//! ## NIST 800-53 Rev5 Controls
//!
//! - CM-6: Configuration settings
//! - SI-10: Information input validation (attribute definitions)
//! - SI-11: Error handling

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod attribute;
pub mod config;
pub mod error;

pub use attribute::{
    AttributeDefinition, AttributeRegistry, AttributeValue, Gender, ImmutableAttributeMap,
    PersonType, ValueMarshaller, XmlType,
};
pub use config::NodeConfig;
pub use error::{Error, Result};
