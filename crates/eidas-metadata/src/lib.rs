//! # eidas-metadata
//!
//! SAML metadata trust for the eIDAS node.
//!
//! Every eIDAS node publishes a signed `EntityDescriptor` describing its
//! endpoints, certificates, supported levels of assurance and algorithms.
//! Peers retrieve that document over HTTPS, validate its signature against
//! the trusted metadata signers and cache the result until its `validUntil`.
//!
//! ## Components
//!
//! - [`EidasMetadataParameters`] - Typed view of an entity descriptor
//! - [`MetadataParser`] / [`MetadataGenerator`] - XML to parameters and back
//! - [`MetadataWhitelist`] - Allowed metadata URLs
//! - [`HttpMetadataFetcher`] - Remote retrieval with URL and signature checks
//! - [`CachingMetadataFetcher`] - Expiry-aware cache in front of a fetcher
//! - [`StaticMetadataSource`] - Pre-loaded metadata without network access
//!
//! ## NIST 800-53 Rev5 Controls
//!
//! - IA-5(2): Public key-based authentication (metadata signer trust)
//! - SC-8: Transmission confidentiality (HTTPS-only retrieval)
//! - SC-23: Session authenticity (peer certificates from signed metadata)

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod error;
pub mod fetcher;
pub mod generator;
pub mod params;
pub mod parser;
pub mod whitelist;

pub use error::{MetadataError, MetadataResult};
pub use fetcher::{
    CachingMetadataFetcher, FetcherSettings, HttpMetadataFetcher, MetadataFetcher, StaticMetadataSource,
};
pub use generator::MetadataGenerator;
pub use params::{
    ContactData, EidasMetadataParameters, EidasMetadataRoleParameters, MetadataRole, OrganizationData,
};
pub use parser::MetadataParser;
pub use whitelist::MetadataWhitelist;
