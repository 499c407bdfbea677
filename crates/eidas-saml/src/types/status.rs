//! SAML Status types.

use serde::{Deserialize, Serialize};

use super::{status_codes, sub_status_codes};
use crate::error::SamlError;

/// SAML protocol status of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// The status code.
    pub status_code: StatusCode,

    /// Optional status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl Status {
    /// Creates a success status.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status_code: StatusCode::success(),
            status_message: None,
        }
    }

    /// Creates a failure status from a top-level code, an optional
    /// second-level code and a message.
    #[must_use]
    pub fn failure(
        code: impl Into<String>,
        sub_code: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        let mut status_code = StatusCode::new(code);
        if let Some(sub) = sub_code {
            status_code = status_code.with_sub_status(StatusCode::new(sub));
        }
        Self {
            status_code,
            status_message: Some(message.into()),
        }
    }

    /// Creates an authentication failed status.
    #[must_use]
    pub fn authn_failed(message: impl Into<String>) -> Self {
        Self::failure(
            status_codes::RESPONDER,
            Some(sub_status_codes::AUTHN_FAILED),
            message,
        )
    }

    /// Creates the failure status reported for an engine error.
    ///
    /// The message carries the eIDAS error key.
    #[must_use]
    pub fn from_error(err: &SamlError) -> Self {
        Self::failure(err.status_code(), err.sub_status_code(), err.error_key())
    }

    /// Returns true if this status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code.is_success()
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}

/// SAML status code, optionally nesting a second-level code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    /// The status code URI value.
    pub value: String,

    /// Optional nested status code providing more detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<Box<StatusCode>>,
}

impl StatusCode {
    /// Creates a new status code with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            status_code: None,
        }
    }

    /// Creates a success status code.
    #[must_use]
    pub fn success() -> Self {
        Self::new(status_codes::SUCCESS)
    }

    /// Adds a sub-status code.
    #[must_use]
    pub fn with_sub_status(mut self, sub: Self) -> Self {
        self.status_code = Some(Box::new(sub));
        self
    }

    /// Returns true if this is a success status code.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.value == status_codes::SUCCESS
    }

    /// Returns the sub-status code value if present.
    #[must_use]
    pub fn sub_status_value(&self) -> Option<&str> {
        self.status_code.as_ref().map(|s| s.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_success() {
        let status = Status::success();
        assert!(status.is_success());
        assert!(status.status_message.is_none());
    }

    #[test]
    fn status_authn_failed() {
        let status = Status::authn_failed("citizen cancelled");
        assert!(!status.is_success());
        assert_eq!(
            status.status_code.sub_status_value(),
            Some(sub_status_codes::AUTHN_FAILED)
        );
    }

    #[test]
    fn status_from_error_carries_error_key() {
        let status = Status::from_error(&SamlError::InvalidLoa("DUPLICATES".to_string()));
        assert_eq!(status.status_code.value, status_codes::REQUESTER);
        assert_eq!(
            status.status_code.sub_status_value(),
            Some(sub_status_codes::NO_AUTHN_CONTEXT)
        );
        assert_eq!(status.status_message.as_deref(), Some("INVALID_LOA"));
    }
}
