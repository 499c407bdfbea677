//! Trusted domain checks.

use tracing::warn;

use crate::error::{SecurityError, SecurityResult};

/// Value trusting no domain.
pub const NONE: &str = "none";

/// Value trusting every domain.
pub const ALL: &str = "all";

/// Domains allowed to post to the protocol endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustedDomains {
    /// No domain is trusted.
    None,
    /// Every domain is trusted.
    All,
    /// Only the listed domains are trusted.
    List(Vec<String>),
}

impl TrustedDomains {
    /// Parses a `;` separated list. A single `none` or `all` entry selects
    /// the corresponding policy.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let domains: Vec<String> = value
            .split(';')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect();
        match domains.as_slice() {
            [single] if single == NONE => Self::None,
            [single] if single == ALL => Self::All,
            _ => Self::List(domains),
        }
    }

    /// Returns whether `domain` is trusted.
    #[must_use]
    pub fn is_trusted(&self, domain: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::List(domains) => domains.iter().any(|d| d == domain),
        }
    }

    /// Checks the referer domain, then that `sp_url`, when present, belongs
    /// to it.
    pub fn check(&self, domain: &str, sp_url: Option<&str>) -> SecurityResult<()> {
        if !self.is_trusted(domain) {
            warn!(domain = %domain, "domain is not trusted");
            return Err(SecurityError::UntrustedDomain(domain.to_string()));
        }
        if let Some(sp_url) = sp_url.filter(|u| !u.is_empty()) {
            if !after_scheme(sp_url).starts_with(&format!("{domain}/")) {
                warn!(sp_url = %sp_url, domain = %domain, "SP URL does not belong to the domain");
                return Err(SecurityError::ForeignSpUrl {
                    sp_url: sp_url.to_string(),
                    domain: domain.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn after_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

/// Extracts the host part of a referer: what follows `://`, up to the first
/// `/`.
#[must_use]
pub fn referer_domain(referer: &str) -> &str {
    let rest = after_scheme(referer);
    match rest.find('/') {
        Some(index) if index > 0 => &rest[..index],
        _ => rest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_policies() {
        assert_eq!(TrustedDomains::parse("none"), TrustedDomains::None);
        assert_eq!(TrustedDomains::parse(" all "), TrustedDomains::All);
        assert_eq!(
            TrustedDomains::parse("sp.example.eu;connector.example.eu:8443"),
            TrustedDomains::List(vec!["sp.example.eu".into(), "connector.example.eu:8443".into()])
        );
        // `all` inside a list is just a domain name
        assert!(!TrustedDomains::parse("all;sp.example.eu").is_trusted("other.example.eu"));
    }

    #[test]
    fn trust_decisions() {
        assert!(!TrustedDomains::None.is_trusted("sp.example.eu"));
        assert!(TrustedDomains::All.is_trusted("anything"));
        let list = TrustedDomains::parse("sp.example.eu");
        assert!(list.is_trusted("sp.example.eu"));
        assert!(!list.is_trusted("SP.example.eu"));
    }

    #[test]
    fn referer_domains() {
        assert_eq!(referer_domain("https://sp.example.eu/login?x=1"), "sp.example.eu");
        assert_eq!(referer_domain("http://sp.example.eu:8080"), "sp.example.eu:8080");
        assert_eq!(referer_domain("https://sp.example.eu/"), "sp.example.eu");
    }

    #[test]
    fn sp_url_must_belong_to_domain() {
        let trusted = TrustedDomains::All;
        assert!(trusted.check("sp.example.eu", Some("https://sp.example.eu/acs")).is_ok());
        assert!(trusted.check("sp.example.eu", None).is_ok());
        assert!(trusted.check("sp.example.eu", Some("")).is_ok());

        let err = trusted
            .check("sp.example.eu", Some("https://sp.example.eu.evil.example/acs"))
            .unwrap_err();
        assert!(matches!(err, SecurityError::ForeignSpUrl { .. }));
    }

    #[test]
    fn untrusted_domain_is_rejected() {
        let err = TrustedDomains::None.check("sp.example.eu", None).unwrap_err();
        assert_eq!(err.error_key(), "CONNECTOR_DOMAIN");
    }
}
