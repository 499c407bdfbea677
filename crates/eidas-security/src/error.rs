//! Security error types.

use thiserror::Error;

/// Errors raised by the anti-abuse filters and log checks.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// The request carries no `Referer` header.
    #[error("request has no referer")]
    MissingReferer,

    /// The referer domain is not trusted.
    #[error("domain {0} is not trusted")]
    UntrustedDomain(String),

    /// The SP URL parameter does not belong to the referer domain.
    #[error("SP URL {sp_url} does not belong to domain {domain}")]
    ForeignSpUrl {
        /// Submitted SP URL.
        sp_url: String,
        /// Referer domain.
        domain: String,
    },

    /// Too many requests within the window.
    #[error("request limit reached for {0}")]
    RateLimited(String),

    /// A hash-chained log line failed verification.
    #[error("log chain broken at line {line}: {reason}")]
    ChainBroken {
        /// One-based line number.
        line: usize,
        /// What did not match.
        reason: String,
    },

    /// Reading a log file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SecurityError {
    /// Returns the eIDAS error key reported to the caller.
    #[must_use]
    pub const fn error_key(&self) -> &'static str {
        match self {
            Self::MissingReferer | Self::UntrustedDomain(_) | Self::ForeignSpUrl { .. } => "CONNECTOR_DOMAIN",
            Self::RateLimited(_) => "REQUESTS_COLLEAGUE_REQUEST",
            Self::ChainBroken { .. } | Self::Io(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status for a rejected request.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::MissingReferer | Self::UntrustedDomain(_) | Self::ForeignSpUrl { .. } => 403,
            Self::RateLimited(_) => 429,
            Self::ChainBroken { .. } | Self::Io(_) => 500,
        }
    }
}

/// Result type for security checks.
pub type SecurityResult<T> = Result<T, SecurityError>;
