//! Metadata URL whitelist.
//!
//! The whitelist is a `;` separated property. Entries are trimmed and
//! compared case-sensitively. Entries that are not valid URIs, or longer
//! than SAML allows for an entity identifier, are dropped with a warning.

use tracing::warn;
use url::Url;

/// Longest URI accepted as a SAML entity identifier.
pub const MAX_URI_LEN: usize = 1024;

/// A parsed list of allowed metadata URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataWhitelist {
    entries: Vec<String>,
}

impl MetadataWhitelist {
    /// Parses a `;` separated list.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let mut entries: Vec<String> = Vec::new();
        for candidate in value.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            match check_uri(candidate) {
                Ok(()) => {
                    if !entries.iter().any(|e| e == candidate) {
                        entries.push(candidate.to_string());
                    }
                }
                Err(reason) => warn!(uri = %candidate, "Non SAML compliant URI: {reason}"),
            }
        }
        Self { entries }
    }

    /// Returns the entries in their configured order.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Returns whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns whether `uri` is listed. An empty list allows nothing.
    #[must_use]
    pub fn is_whitelisted(&self, uri: &str) -> bool {
        is_whitelisted(uri, &self.entries)
    }
}

/// Returns whether `uri` is one of `whitelist`.
#[must_use]
pub fn is_whitelisted(uri: &str, whitelist: &[String]) -> bool {
    whitelist.iter().any(|entry| entry == uri)
}

fn check_uri(candidate: &str) -> Result<(), String> {
    if candidate.len() > MAX_URI_LEN {
        return Err(format!("longer than {MAX_URI_LEN} characters"));
    }
    if let Some(c) = candidate.chars().find(|c| !is_uri_char(*c)) {
        return Err(format!("illegal character '{c}'"));
    }
    Url::parse(candidate).map(|_| ()).map_err(|e| e.to_string())
}

// RFC 3986 unreserved, reserved and percent characters.
fn is_uri_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-._~:/?#[]@!$&'()*+,;=%".contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_uris_are_kept() {
        let list = MetadataWhitelist::parse("http://Europa.eu;mickey://mouse.com");
        assert_eq!(list.entries(), ["http://Europa.eu", "mickey://mouse.com"]);
    }

    #[test]
    fn invalid_uris_are_dropped() {
        let list = MetadataWhitelist::parse("://Europa.eu;urn_o:mouse.com;urn:^mouse.com");
        assert!(list.is_empty());
    }

    #[test]
    fn entries_are_trimmed_and_deduplicated() {
        let list = MetadataWhitelist::parse(" https://a.eu/md ; ;https://a.eu/md;https://b.eu/md ");
        assert_eq!(list.entries(), ["https://a.eu/md", "https://b.eu/md"]);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let list = MetadataWhitelist::parse("http://EURopa.eu;mickey://mouse.com");
        assert!(list.is_whitelisted("http://EURopa.eu"));
        assert!(!list.is_whitelisted("http://europa.eu"));
        assert!(!list.is_whitelisted("MICKEY://mouse.com"));
        assert!(!list.is_whitelisted("http://notWhitelisted"));
    }

    #[test]
    fn empty_list_allows_nothing() {
        assert!(!MetadataWhitelist::default().is_whitelisted("http://notWhitelisted"));
        assert!(!is_whitelisted("http://notWhitelisted", &[]));
    }

    #[test]
    fn length_limit() {
        let max = format!("urn:{}", "a".repeat(MAX_URI_LEN - 4));
        let too_long = format!("urn:{}", "a".repeat(MAX_URI_LEN - 3));
        let list = MetadataWhitelist::parse(&format!("{max};{too_long};donald:duck.com"));
        assert_eq!(list.entries(), [max.as_str(), "donald:duck.com"]);
    }
}
