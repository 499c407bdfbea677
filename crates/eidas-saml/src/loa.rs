//! Levels of assurance.
//!
//! eIDAS notifies three levels (`low`, `substantial`, `high`); member states
//! may additionally request non-notified levels published under their own
//! URIs. Requests state the accepted levels together with a comparison:
//!
//! - `minimum`: exactly one notified level, any higher level is accepted;
//! - `exact`: a list of accepted levels. A notified level in the list must be
//!   accompanied by every higher notified level, and a list of only notified
//!   levels must be expressed with `minimum` instead.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SamlError, SamlResult};
use crate::types::{AuthnContextComparison, RequestedAuthnContext};

/// URI prefix reserved for the notified levels.
pub const NOTIFIED_LOA_PREFIX: &str = "http://eidas.europa.eu/LoA/";

/// Rule keys reported by [`EidasRequestedAuthContextValidator`].
pub mod rules {
    /// The request has no requested authentication context.
    pub const CONTEXT_MISSING: &str = "RequestedAuthnContext is null";
    /// No level of assurance is requested.
    pub const NO_LOA_FOUND: &str = "NO_LOA_FOUND";
    /// The same level is requested twice.
    pub const DUPLICATES: &str = "DUPLICATES";
    /// `minimum` with more than one level.
    pub const MINIMUM_MORE_THEN_ONE: &str = "MINIMUM_MORE_THEN_ONE";
    /// `minimum` with a non-notified level.
    pub const MINIMUM_CONTAINS_NON_NOTIFIED: &str = "MINIMUM_CONTAINS_NON_NOTIFIED";
    /// `exact` with a notified level but not every higher one.
    pub const EXACT_NOTIFIED_MISSING_HIGHER_LEVELS: &str = "EXACT_NOTIFIED_MISSING_HIGHER_LEVELS";
    /// `exact` with notified levels only.
    pub const EXACT_CONTAINS_ONLY_NOTIFIED: &str = "EXACT_CONTAINS_ONLY_NOTIFIED";
    /// `better` or `maximum`.
    pub const COMPARISON_NOT_SUPPORTED: &str = "COMPARISON_NOT_SUPPORTED";
}

/// Notified level of assurance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NotifiedLevelOfAssurance {
    /// `http://eidas.europa.eu/LoA/low`.
    Low,
    /// `http://eidas.europa.eu/LoA/substantial`.
    Substantial,
    /// `http://eidas.europa.eu/LoA/high`.
    High,
}

impl NotifiedLevelOfAssurance {
    /// All levels, lowest first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Substantial, Self::High];

    /// Returns the level URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Low => "http://eidas.europa.eu/LoA/low",
            Self::Substantial => "http://eidas.europa.eu/LoA/substantial",
            Self::High => "http://eidas.europa.eu/LoA/high",
        }
    }

    /// Parses a level URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.uri() == uri.trim())
    }

    /// Returns the numeric order (1 = low).
    #[must_use]
    pub const fn order(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Substantial => 2,
            Self::High => 3,
        }
    }

    /// Returns the levels above this one.
    #[must_use]
    pub fn higher_levels(self) -> Vec<Self> {
        Self::ALL.into_iter().filter(|l| *l > self).collect()
    }
}

/// Returns true for URIs of notified levels.
#[must_use]
pub fn is_notified(uri: &str) -> bool {
    NotifiedLevelOfAssurance::from_uri(uri).is_some()
}

fn invalid(rule: &str) -> SamlError {
    debug!(rule, "requested authentication context rejected");
    SamlError::InvalidLoa(rule.to_string())
}

/// Validates the `RequestedAuthnContext` of an incoming eIDAS request.
#[derive(Debug, Clone, Copy, Default)]
pub struct EidasRequestedAuthContextValidator;

impl EidasRequestedAuthContextValidator {
    /// Applies the level of assurance rules.
    ///
    /// The error carries the key of the first rule violated.
    pub fn validate(context: Option<&RequestedAuthnContext>) -> SamlResult<()> {
        let context = context.ok_or_else(|| invalid(rules::CONTEXT_MISSING))?;
        let levels = &context.authn_context_class_refs;

        if levels.is_empty() {
            return Err(invalid(rules::NO_LOA_FOUND));
        }
        let distinct: HashSet<&str> = levels.iter().map(String::as_str).collect();
        if distinct.len() != levels.len() {
            return Err(invalid(rules::DUPLICATES));
        }

        match context.effective_comparison() {
            AuthnContextComparison::Minimum => {
                if levels.len() > 1 {
                    return Err(invalid(rules::MINIMUM_MORE_THEN_ONE));
                }
                if !is_notified(&levels[0]) {
                    return Err(invalid(rules::MINIMUM_CONTAINS_NON_NOTIFIED));
                }
                Ok(())
            }
            AuthnContextComparison::Exact => {
                let notified: Vec<NotifiedLevelOfAssurance> = levels
                    .iter()
                    .filter_map(|l| NotifiedLevelOfAssurance::from_uri(l))
                    .collect();
                for level in &notified {
                    if !level.higher_levels().iter().all(|h| notified.contains(h)) {
                        return Err(invalid(rules::EXACT_NOTIFIED_MISSING_HIGHER_LEVELS));
                    }
                }
                if notified.len() == levels.len() {
                    return Err(invalid(rules::EXACT_CONTAINS_ONLY_NOTIFIED));
                }
                Ok(())
            }
            AuthnContextComparison::Better | AuthnContextComparison::Maximum => {
                Err(invalid(rules::COMPARISON_NOT_SUPPORTED))
            }
        }
    }
}

/// Validates the levels of assurance of a light request before it is
/// turned into a SAML request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelOfAssuranceRequestValidator;

impl LevelOfAssuranceRequestValidator {
    /// Checks `levels` under `comparison`.
    pub fn validate(levels: &[String], comparison: AuthnContextComparison) -> SamlResult<()> {
        if levels.is_empty() {
            return Err(SamlError::InvalidLoa("Loa list can not be empty".to_string()));
        }

        let mut notified = Vec::new();
        let mut non_notified = 0usize;
        for level in levels {
            match NotifiedLevelOfAssurance::from_uri(level) {
                Some(n) => notified.push(n),
                None if level.trim().starts_with(NOTIFIED_LOA_PREFIX) => {
                    return Err(SamlError::InvalidLoa(format!(
                        "non-notified level {level} uses the notified prefix"
                    )));
                }
                None => non_notified += 1,
            }
        }

        match (notified.len(), non_notified, comparison) {
            (1, 0, AuthnContextComparison::Minimum) | (0, _, AuthnContextComparison::Exact) => Ok(()),
            (1, 0, _) => Err(SamlError::InvalidLoa(
                "a single notified level requires the minimum comparison".to_string(),
            )),
            (0, _, _) => Err(SamlError::InvalidLoa(
                "non-notified levels require the exact comparison".to_string(),
            )),
            (n, _, AuthnContextComparison::Exact) if n <= 3 => {
                let mut expected = vec![NotifiedLevelOfAssurance::High];
                if n >= 2 {
                    expected.push(NotifiedLevelOfAssurance::Substantial);
                }
                if n == 3 {
                    expected.push(NotifiedLevelOfAssurance::Low);
                }
                if expected.iter().all(|e| notified.contains(e)) {
                    Ok(())
                } else {
                    Err(SamlError::InvalidLoa(
                        "notified levels must include every higher level".to_string(),
                    ))
                }
            }
            _ => Err(SamlError::InvalidLoa(
                "mixed levels require the exact comparison and at most three notified levels"
                    .to_string(),
            )),
        }
    }
}

/// Returns true when `response_level` satisfies the requested context.
///
/// Under `minimum` a notified response level at or above the requested one
/// matches; under `exact` the response level must be listed.
#[must_use]
pub fn is_satisfied_by(requested: &RequestedAuthnContext, response_level: &str) -> bool {
    let response_level = response_level.trim();
    match requested.effective_comparison() {
        AuthnContextComparison::Minimum => {
            let Some(achieved) = NotifiedLevelOfAssurance::from_uri(response_level) else {
                return false;
            };
            requested
                .authn_context_class_refs
                .iter()
                .filter_map(|l| NotifiedLevelOfAssurance::from_uri(l))
                .any(|wanted| achieved >= wanted)
        }
        AuthnContextComparison::Exact => requested
            .authn_context_class_refs
            .iter()
            .any(|l| l.trim() == response_level),
        AuthnContextComparison::Better | AuthnContextComparison::Maximum => false,
    }
}
