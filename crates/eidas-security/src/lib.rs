//! # eidas-security
//!
//! Anti-abuse protections in front of the eIDAS protocol endpoints.
//!
//! - [`SecurityRequestFilter`] - Referer domain and request rate checks
//! - [`SlidingWindowLimiter`] - Per-key request timestamps over a window
//! - [`TrustedDomains`] - Configured domain trust (`all`, `none` or a list)
//! - [`HashAndCounterGenerator`] / [`HashFileChecker`] - Tamper-evident log
//!   lines chained by SHA-256
//!
//! ## NIST 800-53 Rev5 Controls
//!
//! - AU-9: Protection of audit information (hash-chained logs)
//! - AU-10: Non-repudiation
//! - SC-5: Denial-of-service protection (rate limiting)
//! - SC-7: Boundary protection (trusted domains)

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod domain;
pub mod error;
pub mod filter;
pub mod hash_chain;
pub mod limiter;

pub use domain::TrustedDomains;
pub use error::{SecurityError, SecurityResult};
pub use filter::{SecurityRequest, SecurityRequestFilter};
pub use hash_chain::{HashAndCounterGenerator, HashFileChecker};
pub use limiter::SlidingWindowLimiter;
