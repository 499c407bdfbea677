//! # eidas-light
//!
//! Exchange of light requests and light responses between the eIDAS node
//! and the member state specific adapters.
//!
//! A message is never passed by value across the boundary. The sending side
//! stores the serialized message in a correlation cache and hands over a
//! short, digest-protected [`BinaryLightToken`]; the receiving side verifies
//! the token and removes the message from the cache exactly once.
//!
//! ## Modules
//!
//! - [`token`] - LightToken / BinaryLightToken codec
//! - [`message`] - LightRequest / LightResponse and their XML form
//! - [`service`] - Specific communication service over an atomic cache
//!
//! ## NIST 800-53 Rev5 Controls
//!
//! - SC-8: Transmission integrity (token digest)
//! - SC-23: Session authenticity (single-use correlation)
//! - SI-10: Information input validation

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod error;
pub mod message;
pub mod service;
pub mod token;

pub use error::{LightError, LightResult, LightTokenError};
pub use message::{LightRequest, LightRequestBuilder, LightResponse, LightResponseBuilder, ResponseStatus};
pub use service::{NodeSide, SpecificCommunicationService};
pub use token::{BinaryLightToken, LightToken, LightTokenCodec, TokenDigest};
