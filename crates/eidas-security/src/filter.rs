//! Request filter guarding the protocol endpoints.

use chrono::{DateTime, Utc};
use eidas_core::config::SecurityConfig;
use tracing::{debug, info, trace};

use crate::domain::{TrustedDomains, referer_domain};
use crate::error::{SecurityError, SecurityResult};
use crate::limiter::SlidingWindowLimiter;

/// Path of the CSP report endpoint, exempt from the domain and rate checks.
pub const CSP_REPORT_HANDLER: &str = "cspReportHandler";

/// Threshold value disabling a rate check.
pub const DISABLED: i64 = -1;

/// What the filter needs to know about an incoming request.
#[derive(Debug, Clone, Copy)]
pub struct SecurityRequest<'a> {
    /// Request path, e.g. `/ColleagueRequest`.
    pub path: &'a str,
    /// `Referer` header.
    pub referer: Option<&'a str>,
    /// Client address.
    pub remote_addr: &'a str,
    /// SP URL parameter, when submitted.
    pub sp_url: Option<&'a str>,
}

impl<'a> SecurityRequest<'a> {
    /// Creates a request without referer or SP URL.
    #[must_use]
    pub const fn new(path: &'a str, remote_addr: &'a str) -> Self {
        Self {
            path,
            referer: None,
            remote_addr,
            sp_url: None,
        }
    }

    /// Sets the referer.
    #[must_use]
    pub const fn with_referer(mut self, referer: &'a str) -> Self {
        self.referer = Some(referer);
        self
    }

    /// Sets the SP URL parameter.
    #[must_use]
    pub const fn with_sp_url(mut self, sp_url: &'a str) -> Self {
        self.sp_url = Some(sp_url);
        self
    }
}

/// Domain and rate checks for the included endpoints.
///
/// ## NIST 800-53 Rev5 Controls
///
/// - SC-5: Denial-of-service protection
/// - SC-7: Boundary protection
#[derive(Debug)]
pub struct SecurityRequestFilter {
    config: SecurityConfig,
    trusted_domains: TrustedDomains,
    included_paths: Vec<String>,
    ip_requests: SlidingWindowLimiter,
    sp_requests: SlidingWindowLimiter,
}

impl SecurityRequestFilter {
    /// Creates a filter from the node configuration.
    #[must_use]
    pub fn new(config: SecurityConfig) -> Self {
        let trusted_domains = TrustedDomains::parse(&config.trusted_domains);
        let included_paths = config
            .included_paths
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        info!(included = ?included_paths, "security request filter initialised");
        Self {
            config,
            trusted_domains,
            included_paths,
            ip_requests: SlidingWindowLimiter::new(),
            sp_requests: SlidingWindowLimiter::new(),
        }
    }

    /// Returns whether requests to `path` are filtered.
    #[must_use]
    pub fn is_included(&self, path: &str) -> bool {
        let name = path.replace('/', "");
        !name.is_empty() && self.included_paths.iter().any(|p| *p == name)
    }

    /// Checks `request` at `now`.
    pub fn check_at(&self, request: &SecurityRequest<'_>, now: DateTime<Utc>) -> SecurityResult<()> {
        if !self.is_included(request.path) {
            trace!(path = %request.path, "not filtered");
            return Ok(());
        }
        let name = request.path.replace('/', "");
        if self.config.bypass_validation || name == CSP_REPORT_HANDLER {
            debug!(path = %request.path, "domain and rate checks skipped");
            return Ok(());
        }

        let referer = request.referer.ok_or_else(|| {
            info!(path = %request.path, "request without referer");
            SecurityError::MissingReferer
        })?;
        let domain = referer_domain(referer);
        self.trusted_domains.check(domain, request.sp_url)?;

        if self.config.ip_max_requests != DISABLED {
            self.ip_requests.check(
                request.remote_addr,
                self.config.ip_max_time_secs,
                self.config.ip_max_requests,
                now,
            )?;
        }
        if self.config.sp_max_requests != DISABLED {
            self.sp_requests
                .check(domain, self.config.sp_max_time_secs, self.config.sp_max_requests, now)?;
        }
        Ok(())
    }

    /// Checks `request` now.
    pub fn check(&self, request: &SecurityRequest<'_>) -> SecurityResult<()> {
        self.check_at(request, Utc::now())
    }

    /// Drops limiter state that fell out of the windows.
    pub fn purge(&self, now: DateTime<Utc>) {
        self.ip_requests.purge(self.config.ip_max_time_secs, now);
        self.sp_requests.purge(self.config.sp_max_time_secs, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const REFERER: &str = "https://sp.example.eu/start";

    fn config() -> SecurityConfig {
        SecurityConfig {
            ip_max_time_secs: 60,
            ip_max_requests: 2,
            sp_max_time_secs: 60,
            sp_max_requests: 3,
            trusted_domains: "sp.example.eu;other.example.eu".to_string(),
            bypass_validation: false,
            included_paths: "ColleagueRequest, ColleagueResponse,cspReportHandler".to_string(),
        }
    }

    #[test]
    fn only_included_paths_are_filtered() {
        let filter = SecurityRequestFilter::new(config());
        assert!(filter.is_included("/ColleagueRequest"));
        assert!(filter.is_included("ColleagueResponse"));
        assert!(!filter.is_included("/metadata"));
        assert!(!filter.is_included("/"));

        let request = SecurityRequest::new("/metadata", "192.0.2.1");
        assert!(filter.check(&request).is_ok());
    }

    #[test]
    fn missing_and_untrusted_referers() {
        let filter = SecurityRequestFilter::new(config());
        let request = SecurityRequest::new("/ColleagueRequest", "192.0.2.1");
        assert!(matches!(filter.check(&request), Err(SecurityError::MissingReferer)));

        let request = request.with_referer("https://evil.example/x");
        assert!(matches!(filter.check(&request), Err(SecurityError::UntrustedDomain(_))));
    }

    #[test]
    fn ip_limit_applies_per_address() {
        let filter = SecurityRequestFilter::new(config());
        let now = Utc::now();
        let request = SecurityRequest::new("/ColleagueRequest", "192.0.2.1").with_referer(REFERER);
        filter.check_at(&request, now).unwrap();
        filter.check_at(&request, now).unwrap();
        let err = filter.check_at(&request, now).unwrap_err();
        assert_eq!(err.error_key(), "REQUESTS_COLLEAGUE_REQUEST");

        assert!(filter.check_at(&request, now + Duration::seconds(61)).is_ok());
    }

    #[test]
    fn sp_limit_applies_per_domain() {
        let filter = SecurityRequestFilter::new(config());
        let now = Utc::now();
        for addr in ["192.0.2.1", "192.0.2.2", "192.0.2.3"] {
            let request = SecurityRequest::new("/ColleagueRequest", addr).with_referer(REFERER);
            filter.check_at(&request, now).unwrap();
        }
        let request = SecurityRequest::new("/ColleagueRequest", "192.0.2.4").with_referer(REFERER);
        assert!(matches!(filter.check_at(&request, now), Err(SecurityError::RateLimited(_))));

        let request = SecurityRequest::new("/ColleagueRequest", "192.0.2.4")
            .with_referer("https://other.example.eu/");
        assert!(filter.check_at(&request, now).is_ok());
    }

    #[test]
    fn disabled_limits_and_bypass() {
        let filter = SecurityRequestFilter::new(SecurityConfig {
            ip_max_requests: DISABLED,
            sp_max_requests: DISABLED,
            ..config()
        });
        let request = SecurityRequest::new("/ColleagueRequest", "192.0.2.1").with_referer(REFERER);
        for _ in 0..10 {
            filter.check(&request).unwrap();
        }

        let filter = SecurityRequestFilter::new(SecurityConfig {
            bypass_validation: true,
            ..config()
        });
        assert!(filter.check(&SecurityRequest::new("/ColleagueRequest", "192.0.2.1")).is_ok());
    }

    #[test]
    fn csp_report_handler_skips_checks() {
        let filter = SecurityRequestFilter::new(config());
        let request = SecurityRequest::new("/cspReportHandler", "192.0.2.1");
        assert!(filter.check(&request).is_ok());
    }

    #[test]
    fn sp_url_is_checked_against_referer() {
        let filter = SecurityRequestFilter::new(config());
        let request = SecurityRequest::new("/ColleagueRequest", "192.0.2.1")
            .with_referer(REFERER)
            .with_sp_url("https://attacker.example/acs");
        assert!(matches!(filter.check(&request), Err(SecurityError::ForeignSpUrl { .. })));
    }
}
