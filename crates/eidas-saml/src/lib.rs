//! # eidas-saml
//!
//! eIDAS SAML 2.0 protocol engine.
//!
//! - **Messages**: `AuthnRequest` with the eIDAS extensions, `Response` with
//!   plain or encrypted assertions ([`types`], [`xml`])
//! - **XML signature**: enveloped signatures and HTTP-Redirect detached
//!   signatures with algorithm whitelists ([`signature`])
//! - **XML encryption**: AES-GCM assertions with RSA-OAEP or ECDH-ES key
//!   establishment ([`encryption`])
//! - **Levels of assurance**: request rules and response matching ([`loa`])
//! - **Validation** of requests and responses ([`validation`])
//! - **Bindings**: HTTP-POST and HTTP-Redirect ([`bindings`])
//!
//! [`engine::ProtocolEngine`] combines them into the request and response
//! exchanges of connector and proxy service.
//!
//! # Example
//!
//! ```rust,ignore
//! use eidas_saml::engine::{EngineSettings, ProtocolEngine};
//!
//! let engine = ProtocolEngine::new(settings, signer, encryption);
//! let message = engine.generate_request(&request, SamlBinding::HttpPost)?;
//! ```
//!
//! # Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [eIDAS SAML Message Format](https://ec.europa.eu/digital-building-blocks/sites/display/DIGITAL/eIDAS+eID+Profile)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)
//! - [XML Encryption 1.1](https://www.w3.org/TR/xmlenc-core1/)

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod bindings;
pub mod encryption;
pub mod engine;
pub mod error;
pub mod loa;
pub mod signature;
pub mod types;
pub mod validation;
pub mod xml;

pub use engine::{AuthenticationResult, EngineSettings, ProtocolEngine};
pub use error::{SamlError, SamlResult};
pub use types::*;
