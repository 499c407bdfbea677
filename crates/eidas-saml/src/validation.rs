//! Semantic validation of requests and responses.
//!
//! Signature and decryption happen before these checks; the validators only
//! look at typed messages.
//!
//! ## NIST 800-53 Rev5 Controls
//!
//! - IA-2: Identification and authentication
//! - SC-23: Session authenticity
//! - SI-10: Information input validation

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::{SamlError, SamlResult};
use crate::loa::{self, EidasRequestedAuthContextValidator};
use crate::types::{Assertion, EidasAuthnRequest, EidasResponse, MAX_REQUESTER_ID_LEN, SpType};

/// What the metadata of the requesting node says about it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequesterMetadata {
    /// Entity id of the requester.
    pub entity_id: String,
    /// SP type declared in the metadata.
    pub sp_type: Option<SpType>,
    /// Registered assertion consumer service URLs.
    pub assertion_consumer_service_urls: Vec<String>,
}

/// Validates incoming authentication requests.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    clock_skew: Duration,
    validity: Duration,
    expected_destination: Option<String>,
}

impl RequestValidator {
    /// Creates a validator accepting requests issued at most `validity` ago,
    /// with `clock_skew` tolerance on both sides.
    #[must_use]
    pub const fn new(clock_skew: Duration, validity: Duration) -> Self {
        Self {
            clock_skew,
            validity,
            expected_destination: None,
        }
    }

    /// Requires the request destination to equal `destination`.
    #[must_use]
    pub fn with_expected_destination(mut self, destination: impl Into<String>) -> Self {
        self.expected_destination = Some(destination.into());
        self
    }

    /// Validates `request` and returns the SP type it is made for.
    pub fn validate(
        &self,
        request: &EidasAuthnRequest,
        metadata: Option<&RequesterMetadata>,
        now: DateTime<Utc>,
    ) -> SamlResult<SpType> {
        if request.id.trim().is_empty() {
            return Err(SamlError::MissingElement("AuthnRequest/@ID".to_string()));
        }
        if request.issuer.trim().is_empty() {
            return Err(SamlError::MissingElement("AuthnRequest/Issuer".to_string()));
        }
        check_issue_instant(request.issue_instant, now, self.clock_skew, self.validity)?;

        if let Some(expected) = &self.expected_destination {
            let actual = request.destination.as_deref().unwrap_or_default();
            if actual != expected {
                return Err(SamlError::InvalidDestination {
                    expected: expected.clone(),
                    actual: actual.to_string(),
                });
            }
        }

        if let Some(binding) = &request.protocol_binding {
            if request.parsed_binding().is_none() {
                return Err(SamlError::UnsupportedBinding(binding.clone()));
            }
        }
        if request
            .requester_id
            .as_ref()
            .is_some_and(|id| id.len() > MAX_REQUESTER_ID_LEN)
        {
            return Err(SamlError::InvalidRequest("RequesterID is too long".to_string()));
        }

        EidasRequestedAuthContextValidator::validate(request.requested_authn_context.as_ref())?;

        let sp_type = match (request.sp_type, metadata.and_then(|m| m.sp_type)) {
            (Some(_), Some(_)) => return Err(SamlError::InconsistentSpType),
            (Some(sp_type), None) | (None, Some(sp_type)) => sp_type,
            (None, None) => return Err(SamlError::MissingSpType),
        };

        if let (Some(acs), Some(metadata)) = (&request.assertion_consumer_service_url, metadata) {
            if !metadata.assertion_consumer_service_urls.is_empty()
                && !metadata.assertion_consumer_service_urls.contains(acs)
            {
                return Err(SamlError::InvalidAcsUrl(acs.clone()));
            }
        }

        debug!(id = %request.id, issuer = %request.issuer, sp_type = sp_type.as_str(), "request validated");
        Ok(sp_type)
    }
}

/// Validates responses against the request they answer.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    clock_skew: Duration,
    user_ip_address: Option<String>,
}

impl ResponseValidator {
    /// Creates a validator with `clock_skew` tolerance.
    #[must_use]
    pub const fn new(clock_skew: Duration) -> Self {
        Self {
            clock_skew,
            user_ip_address: None,
        }
    }

    /// Requires the bearer confirmation address to equal `address`.
    #[must_use]
    pub fn with_user_ip_address(mut self, address: impl Into<String>) -> Self {
        self.user_ip_address = Some(address.into());
        self
    }

    /// Validates `response` and its (decrypted) `assertions` against the
    /// stored `request`.
    ///
    /// Failure responses are checked for correlation only.
    pub fn validate(
        &self,
        response: &EidasResponse,
        assertions: &[Assertion],
        request: &EidasAuthnRequest,
        now: DateTime<Utc>,
    ) -> SamlResult<()> {
        check_in_response_to(response.in_response_to.as_deref(), &request.id)?;

        if let (Some(expected), Some(actual)) = (
            &request.assertion_consumer_service_url,
            &response.destination,
        ) {
            if expected != actual {
                return Err(SamlError::InvalidDestination {
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }

        if !response.is_success() {
            debug!(id = %response.id, status = %response.status.status_code.value, "failure response");
            return Ok(());
        }
        if assertions.is_empty() {
            return Err(SamlError::InvalidResponse("response contains no assertion".to_string()));
        }
        for assertion in assertions {
            self.validate_assertion(assertion, request, now)?;
        }
        debug!(id = %response.id, in_response_to = %request.id, "response validated");
        Ok(())
    }

    fn validate_assertion(
        &self,
        assertion: &Assertion,
        request: &EidasAuthnRequest,
        now: DateTime<Utc>,
    ) -> SamlResult<()> {
        let conditions = assertion
            .conditions
            .as_ref()
            .ok_or_else(|| SamlError::MissingElement("Assertion/Conditions".to_string()))?;
        let not_before = conditions
            .not_before
            .ok_or_else(|| SamlError::MissingElement("Conditions/@NotBefore".to_string()))?;
        let not_on_or_after = conditions
            .not_on_or_after
            .ok_or_else(|| SamlError::MissingElement("Conditions/@NotOnOrAfter".to_string()))?;
        if now + self.clock_skew < not_before {
            return Err(SamlError::AssertionNotYetValid);
        }
        if now - self.clock_skew >= not_on_or_after {
            return Err(SamlError::AssertionExpired);
        }

        if !conditions.audiences.iter().any(|a| a == &request.issuer) {
            return Err(SamlError::InvalidAudience {
                expected: request.issuer.clone(),
                actual: conditions.audiences.join(","),
            });
        }

        self.validate_bearer(assertion, request, now)?;

        let level = assertion
            .level_of_assurance()
            .ok_or_else(|| SamlError::InvalidLoa(loa::rules::NO_LOA_FOUND.to_string()))?;
        if let Some(requested) = &request.requested_authn_context {
            if !loa::is_satisfied_by(requested, level) {
                return Err(SamlError::InvalidLoa(format!("{level} does not satisfy the request")));
            }
        }
        Ok(())
    }

    fn validate_bearer(
        &self,
        assertion: &Assertion,
        request: &EidasAuthnRequest,
        now: DateTime<Utc>,
    ) -> SamlResult<()> {
        let data = assertion
            .bearer_confirmation()
            .and_then(|c| c.data.as_ref())
            .ok_or_else(|| {
                SamlError::InvalidSubjectConfirmation("bearer subject confirmation is missing".to_string())
            })?;

        if data.in_response_to.as_deref() != Some(request.id.as_str()) {
            return Err(SamlError::InvalidSubjectConfirmation(
                "InResponseTo does not match the request".to_string(),
            ));
        }
        if let (Some(expected), Some(recipient)) =
            (&request.assertion_consumer_service_url, &data.recipient)
        {
            if expected != recipient {
                return Err(SamlError::InvalidSubjectConfirmation(format!(
                    "unexpected recipient {recipient}"
                )));
            }
        }
        match data.not_on_or_after {
            Some(limit) if now - self.clock_skew < limit => {}
            Some(_) => {
                return Err(SamlError::InvalidSubjectConfirmation(
                    "subject confirmation expired".to_string(),
                ));
            }
            None => {
                return Err(SamlError::InvalidSubjectConfirmation(
                    "NotOnOrAfter is missing".to_string(),
                ));
            }
        }
        if let Some(expected) = &self.user_ip_address {
            if data.address.as_ref() != Some(expected) {
                return Err(SamlError::InvalidSubjectConfirmation(
                    "address does not match the user".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn check_in_response_to(actual: Option<&str>, expected: &str) -> SamlResult<()> {
    match actual {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(SamlError::InResponseToMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }),
        None => Err(SamlError::MissingElement("Response/@InResponseTo".to_string())),
    }
}

fn check_issue_instant(
    issue_instant: DateTime<Utc>,
    now: DateTime<Utc>,
    clock_skew: Duration,
    validity: Duration,
) -> SamlResult<()> {
    if issue_instant > now + clock_skew {
        return Err(SamlError::InvalidIssueInstant(format!("{issue_instant} is in the future")));
    }
    if issue_instant + validity + clock_skew < now {
        return Err(SamlError::InvalidIssueInstant(format!("{issue_instant} is too old")));
    }
    Ok(())
}
