//! eIDAS SAML 2.0 types.
//!
//! Requests, responses, assertions and the constants they use.

mod assertion;
mod authn_request;
mod constants;
mod name_id;
mod response;
mod status;

pub use assertion::*;
pub use authn_request::*;
pub use constants::*;
pub use name_id::*;
pub use response::*;
pub use status::*;
