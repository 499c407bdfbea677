//! Configuration management for the eIDAS node.
//!
//! Configuration is loaded from environment variables (optionally through a
//! `.env` file) with defaults for every optional setting. Each section is also
//! deserializable with `serde`, so the same structures can be read from a file.
//!
//! ## NIST 800-53 Rev5: CM-6 (Configuration Settings)

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure for a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// SAML engine configuration.
    pub saml: SamlConfig,
    /// Light token settings for requests handed to the specific adapter.
    pub light_request: LightTokenConfig,
    /// Light token settings for responses coming back from the specific adapter.
    pub light_response: LightTokenConfig,
    /// Remote metadata retrieval configuration.
    pub metadata: MetadataConfig,
    /// Anti-abuse filter configuration.
    pub security: SecurityConfig,
    /// Cache backend configuration.
    pub cache: CacheConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL of the node.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// SAML engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamlConfig {
    /// Country code of this node.
    #[serde(default = "default_country")]
    pub country: String,
    /// Allowed clock skew when checking message time windows, in seconds.
    #[serde(default = "default_clock_skew")]
    pub clock_skew_secs: u64,
    /// Validity of generated assertions, in seconds.
    #[serde(default = "default_assertion_validity")]
    pub assertion_validity_secs: u64,
    /// `;` separated signature algorithm URIs accepted when validating.
    #[serde(default = "default_signature_whitelist")]
    pub signature_algorithm_whitelist: String,
    /// Signature algorithm URI used when signing.
    #[serde(default = "default_signature_algorithm")]
    pub signature_algorithm: String,
    /// `;` separated data encryption algorithm URIs accepted when decrypting.
    #[serde(default = "default_encryption_whitelist")]
    pub encryption_algorithm_whitelist: String,
    /// Data encryption algorithm URI used when encrypting.
    #[serde(default = "default_data_encryption_algorithm")]
    pub data_encryption_algorithm: String,
    /// Whether responses must carry encrypted assertions.
    #[serde(default = "default_true")]
    pub response_encryption_mandatory: bool,
    /// Whether certificate validity periods are enforced.
    #[serde(default = "default_true")]
    pub check_validity_period: bool,
    /// Whether self-signed certificates are rejected.
    #[serde(default)]
    pub disallow_self_signed: bool,
    /// PEM file holding the signing private key (PKCS#8).
    #[serde(default)]
    pub signing_key_path: Option<String>,
    /// PEM file holding the signing certificate.
    #[serde(default)]
    pub signing_cert_path: Option<String>,
    /// PEM file holding the decryption private key (PKCS#8).
    #[serde(default)]
    pub decryption_key_path: Option<String>,
    /// PEM file holding the decryption certificate.
    #[serde(default)]
    pub decryption_cert_path: Option<String>,
}

/// Light token configuration for one direction of the specific exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightTokenConfig {
    /// Issuer name written into the token.
    pub issuer: String,
    /// Shared secret salted into the digest.
    pub secret: String,
    /// Digest algorithm name (`SHA-256`, `SHA-384`, `SHA-512`, `HmacSHA256`, ...).
    #[serde(default = "default_token_algorithm")]
    pub algorithm: String,
    /// Lifetime of the cached message, in seconds.
    #[serde(default = "default_token_ttl")]
    pub ttl_secs: u64,
}

/// Remote metadata retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// `;` separated whitelist of metadata URLs.
    #[serde(default)]
    pub whitelist: String,
    /// Whether the whitelist is enforced.
    #[serde(default)]
    pub whitelist_enabled: bool,
    /// Whether plain `http` metadata URLs are accepted.
    #[serde(default)]
    pub allow_http: bool,
    /// Whether fetched metadata signatures are validated.
    #[serde(default = "default_true")]
    pub validate_signature: bool,
    /// Whether each access goes to the network even when cached.
    #[serde(default)]
    pub http_retrieval: bool,
    /// HTTP timeout for metadata retrieval, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// `,` or `;` separated TLS protocol versions.
    #[serde(default = "default_tls_protocols")]
    pub tls_enabled_protocols: String,
    /// Validity written into generated metadata, in seconds.
    #[serde(default = "default_metadata_validity")]
    pub validity_secs: u64,
    /// `;` separated PEM files of the certificates trusted to sign metadata.
    #[serde(default)]
    pub trusted_certificates: String,
}

/// Anti-abuse filter configuration.
///
/// A value of `-1` for a request threshold disables the corresponding check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Window for the per-IP check, in seconds.
    #[serde(default = "default_max_time")]
    pub ip_max_time_secs: i64,
    /// Maximum requests per IP in the window.
    #[serde(default = "default_disabled")]
    pub ip_max_requests: i64,
    /// Window for the per-SP check, in seconds.
    #[serde(default = "default_max_time")]
    pub sp_max_time_secs: i64,
    /// Maximum requests per SP domain in the window.
    #[serde(default = "default_disabled")]
    pub sp_max_requests: i64,
    /// `;` separated trusted domains, or `all` / `none`.
    #[serde(default = "default_trusted_domains")]
    pub trusted_domains: String,
    /// Skip the domain and rate checks entirely.
    #[serde(default)]
    pub bypass_validation: bool,
    /// `,` separated endpoint names subject to the filter.
    #[serde(default = "default_included_paths")]
    pub included_paths: String,
}

/// Cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis connection URL. The in-memory cache is used when absent.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Prefix applied to every cache key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl NodeConfig {
    /// Loads configuration from environment variables.
    ///
    /// The light token secrets are mandatory; everything else has a default.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let host = env_string("EIDAS_HOST", default_host());
        let port = env_parse("EIDAS_PORT", default_port());
        let base_url = env_string("EIDAS_BASE_URL", format!("http://{host}:{port}"));

        let server = ServerConfig {
            host,
            port,
            base_url,
        };

        let saml = SamlConfig {
            country: env_string("EIDAS_COUNTRY", default_country()),
            clock_skew_secs: env_parse("EIDAS_CLOCK_SKEW", default_clock_skew()),
            assertion_validity_secs: env_parse(
                "EIDAS_ASSERTION_VALIDITY",
                default_assertion_validity(),
            ),
            signature_algorithm_whitelist: env_string(
                "EIDAS_SIGNATURE_WHITELIST",
                default_signature_whitelist(),
            ),
            signature_algorithm: env_string(
                "EIDAS_SIGNATURE_ALGORITHM",
                default_signature_algorithm(),
            ),
            encryption_algorithm_whitelist: env_string(
                "EIDAS_ENCRYPTION_WHITELIST",
                default_encryption_whitelist(),
            ),
            data_encryption_algorithm: env_string(
                "EIDAS_DATA_ENCRYPTION_ALGORITHM",
                default_data_encryption_algorithm(),
            ),
            response_encryption_mandatory: env_bool("EIDAS_RESPONSE_ENCRYPTION_MANDATORY", true),
            check_validity_period: env_bool("EIDAS_CHECK_VALIDITY_PERIOD", true),
            disallow_self_signed: env_bool("EIDAS_DISALLOW_SELF_SIGNED", false),
            signing_key_path: std::env::var("EIDAS_SIGNING_KEY").ok(),
            signing_cert_path: std::env::var("EIDAS_SIGNING_CERT").ok(),
            decryption_key_path: std::env::var("EIDAS_DECRYPTION_KEY").ok(),
            decryption_cert_path: std::env::var("EIDAS_DECRYPTION_CERT").ok(),
        };

        let light_request = LightTokenConfig {
            issuer: env_string("EIDAS_LIGHT_REQUEST_ISSUER", "specificCommunicationDefinitionConnectorRequest".to_string()),
            secret: env_required("EIDAS_LIGHT_REQUEST_SECRET")?,
            algorithm: env_string("EIDAS_LIGHT_REQUEST_ALGORITHM", default_token_algorithm()),
            ttl_secs: env_parse("EIDAS_LIGHT_REQUEST_TTL", default_token_ttl()),
        };

        let light_response = LightTokenConfig {
            issuer: env_string("EIDAS_LIGHT_RESPONSE_ISSUER", "specificCommunicationDefinitionConnectorResponse".to_string()),
            secret: env_required("EIDAS_LIGHT_RESPONSE_SECRET")?,
            algorithm: env_string("EIDAS_LIGHT_RESPONSE_ALGORITHM", default_token_algorithm()),
            ttl_secs: env_parse("EIDAS_LIGHT_RESPONSE_TTL", default_token_ttl()),
        };

        let metadata = MetadataConfig {
            whitelist: env_string("EIDAS_METADATA_WHITELIST", String::new()),
            whitelist_enabled: env_bool("EIDAS_METADATA_WHITELIST_ENABLED", false),
            allow_http: env_bool("EIDAS_METADATA_ALLOW_HTTP", false),
            validate_signature: env_bool("EIDAS_METADATA_VALIDATE_SIGNATURE", true),
            http_retrieval: env_bool("EIDAS_METADATA_HTTP_RETRIEVAL", false),
            fetch_timeout_secs: env_parse("EIDAS_METADATA_TIMEOUT", default_fetch_timeout()),
            tls_enabled_protocols: env_string(
                "EIDAS_METADATA_TLS_PROTOCOLS",
                default_tls_protocols(),
            ),
            validity_secs: env_parse("EIDAS_METADATA_VALIDITY", default_metadata_validity()),
            trusted_certificates: env_string("EIDAS_METADATA_TRUSTED_CERTS", String::new()),
        };

        let security = SecurityConfig {
            ip_max_time_secs: env_parse("EIDAS_IP_MAX_TIME", default_max_time()),
            ip_max_requests: env_parse("EIDAS_IP_MAX_REQUESTS", default_disabled()),
            sp_max_time_secs: env_parse("EIDAS_SP_MAX_TIME", default_max_time()),
            sp_max_requests: env_parse("EIDAS_SP_MAX_REQUESTS", default_disabled()),
            trusted_domains: env_string("EIDAS_TRUSTED_DOMAINS", default_trusted_domains()),
            bypass_validation: env_bool("EIDAS_SECURITY_BYPASS", false),
            included_paths: env_string("EIDAS_SECURITY_INCLUDED_PATHS", default_included_paths()),
        };

        let cache = CacheConfig {
            redis_url: std::env::var("REDIS_URL").ok(),
            key_prefix: env_string("EIDAS_CACHE_PREFIX", default_key_prefix()),
        };

        Ok(Self {
            server,
            saml,
            light_request,
            light_response,
            metadata,
            security,
            cache,
        })
    }

    /// Creates a configuration for testing.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                base_url: "http://localhost:8080".to_string(),
            },
            saml: SamlConfig::default(),
            light_request: LightTokenConfig::new(
                "specificCommunicationDefinitionConnectorRequest",
                "mySecretConnectorRequest",
            ),
            light_response: LightTokenConfig::new(
                "specificCommunicationDefinitionConnectorResponse",
                "mySecretConnectorResponse",
            ),
            metadata: MetadataConfig {
                allow_http: true,
                ..MetadataConfig::default()
            },
            security: SecurityConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        for token in [&self.light_request, &self.light_response] {
            if token.issuer.trim().is_empty() {
                return Err(Error::Config("light token issuer cannot be blank".into()));
            }
            if token.secret.trim().is_empty() {
                return Err(Error::Config("light token secret cannot be blank".into()));
            }
        }
        if self.saml.country.trim().is_empty() {
            return Err(Error::Config("node country cannot be blank".into()));
        }
        Ok(())
    }
}

impl SamlConfig {
    /// Returns the allowed clock skew.
    #[must_use]
    pub const fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }
}

impl Default for SamlConfig {
    fn default() -> Self {
        Self {
            country: default_country(),
            clock_skew_secs: default_clock_skew(),
            assertion_validity_secs: default_assertion_validity(),
            signature_algorithm_whitelist: default_signature_whitelist(),
            signature_algorithm: default_signature_algorithm(),
            encryption_algorithm_whitelist: default_encryption_whitelist(),
            data_encryption_algorithm: default_data_encryption_algorithm(),
            response_encryption_mandatory: true,
            check_validity_period: true,
            disallow_self_signed: false,
            signing_key_path: None,
            signing_cert_path: None,
            decryption_key_path: None,
            decryption_cert_path: None,
        }
    }
}

impl LightTokenConfig {
    /// Creates a token configuration with the default algorithm and lifetime.
    #[must_use]
    pub fn new(issuer: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            secret: secret.into(),
            algorithm: default_token_algorithm(),
            ttl_secs: default_token_ttl(),
        }
    }

    /// Sets the digest algorithm.
    #[must_use]
    pub fn algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    /// Sets the lifetime of cached messages.
    #[must_use]
    pub const fn ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Returns the cache lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            whitelist: String::new(),
            whitelist_enabled: false,
            allow_http: false,
            validate_signature: true,
            http_retrieval: false,
            fetch_timeout_secs: default_fetch_timeout(),
            tls_enabled_protocols: default_tls_protocols(),
            validity_secs: default_metadata_validity(),
            trusted_certificates: String::new(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            ip_max_time_secs: default_max_time(),
            ip_max_requests: default_disabled(),
            sp_max_time_secs: default_max_time(),
            sp_max_requests: default_disabled(),
            trusted_domains: default_trusted_domains(),
            bypass_validation: false,
            included_paths: default_included_paths(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, "unparseable configuration value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}

fn env_required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::Config(format!("{key} environment variable is required")))
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_country() -> String {
    "EU".to_string()
}

const fn default_clock_skew() -> u64 {
    60
}

const fn default_assertion_validity() -> u64 {
    300
}

fn default_signature_whitelist() -> String {
    [
        "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
        "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384",
        "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
        "http://www.w3.org/2007/05/xmldsig-more#sha256-rsa-MGF1",
        "http://www.w3.org/2007/05/xmldsig-more#sha384-rsa-MGF1",
        "http://www.w3.org/2007/05/xmldsig-more#sha512-rsa-MGF1",
        "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256",
        "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384",
        "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512",
    ]
    .join(";")
}

fn default_signature_algorithm() -> String {
    "http://www.w3.org/2007/05/xmldsig-more#sha256-rsa-MGF1".to_string()
}

fn default_encryption_whitelist() -> String {
    [
        "http://www.w3.org/2009/xmlenc11#aes128-gcm",
        "http://www.w3.org/2009/xmlenc11#aes192-gcm",
        "http://www.w3.org/2009/xmlenc11#aes256-gcm",
    ]
    .join(";")
}

fn default_data_encryption_algorithm() -> String {
    "http://www.w3.org/2009/xmlenc11#aes256-gcm".to_string()
}

const fn default_true() -> bool {
    true
}

fn default_token_algorithm() -> String {
    "SHA-256".to_string()
}

const fn default_token_ttl() -> u64 {
    120
}

const fn default_fetch_timeout() -> u64 {
    10
}

fn default_tls_protocols() -> String {
    "TLSv1.2".to_string()
}

const fn default_metadata_validity() -> u64 {
    86_400
}

const fn default_max_time() -> i64 {
    60
}

const fn default_disabled() -> i64 {
    -1
}

fn default_trusted_domains() -> String {
    "all".to_string()
}

fn default_included_paths() -> String {
    "ColleagueRequest,ColleagueResponse".to_string()
}

fn default_key_prefix() -> String {
    "eidas".to_string()
}
