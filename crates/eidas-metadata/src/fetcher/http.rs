//! Remote metadata retrieval.

use async_trait::async_trait;
use eidas_crypto::Certificate;
use eidas_saml::signature::XmlSignatureValidator;
use eidas_saml::xml;
use reqwest::header::ACCEPT;
use reqwest::tls::Version;
use tracing::{debug, info, warn};

use super::{FetcherSettings, MetadataFetcher};
use crate::error::{MetadataError, MetadataResult};
use crate::params::EidasMetadataParameters;
use crate::parser::MetadataParser;

const METADATA_ACCEPT: &str = "application/samlmetadata+xml, application/xml, text/xml";

/// Downloads metadata over HTTPS and checks its signature against the
/// trusted metadata signers.
#[derive(Debug, Clone)]
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
    settings: FetcherSettings,
    validator: XmlSignatureValidator,
}

impl HttpMetadataFetcher {
    /// Creates a fetcher trusting `trusted_signers` for metadata signatures.
    pub fn new(settings: FetcherSettings, trusted_signers: Vec<Certificate>) -> MetadataResult<Self> {
        let (min, max) = tls_bounds(&settings.tls_protocols);
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .min_tls_version(min)
            .max_tls_version(max)
            .https_only(!settings.allow_http)
            .build()?;
        Ok(Self {
            client,
            settings,
            validator: XmlSignatureValidator::new(trusted_signers),
        })
    }

    /// Returns the retrieval settings.
    #[must_use]
    pub const fn settings(&self) -> &FetcherSettings {
        &self.settings
    }

    async fn download(&self, url: &str) -> MetadataResult<String> {
        let response = self.client.get(url).header(ACCEPT, METADATA_ACCEPT).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Fetch(format!("HTTP {status} from \"{url}\"")));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn get_metadata(&self, url: &str) -> MetadataResult<EidasMetadataParameters> {
        self.settings.validate_url(url)?;
        let body = self.download(url).await?;

        let root = if self.settings.validate_signature {
            self.validator.validate(&body).map_err(|e| {
                warn!(url = %url, error = %e, "metadata signature rejected");
                MetadataError::Signature(e.to_string())
            })?
        } else {
            debug!(url = %url, "metadata signature validation disabled");
            xml::parse(&body)?
        };

        let params = MetadataParser::from_element(&root)?;
        if params.entity_id != url {
            warn!(url = %url, entity_id = %params.entity_id, "entityID differs from metadata URL");
            return Err(MetadataError::Invalid(format!(
                "entityID \"{}\" does not match metadata URL \"{url}\"",
                params.entity_id
            )));
        }
        info!(url = %url, valid_until = ?params.valid_until, "metadata retrieved");
        Ok(params)
    }
}

fn tls_version(name: &str) -> Option<Version> {
    match name {
        "TLSv1.2" => Some(Version::TLS_1_2),
        "TLSv1.3" => Some(Version::TLS_1_3),
        _ => None,
    }
}

// Lowest and highest supported versions among the configured ones.
fn tls_bounds(protocols: &[String]) -> (Version, Version) {
    let mut versions: Vec<Version> = Vec::new();
    for name in protocols {
        match tls_version(name) {
            Some(version) => versions.push(version),
            None => warn!(protocol = %name, "ignoring unsupported TLS protocol"),
        }
    }
    let min = if versions.contains(&Version::TLS_1_2) || versions.is_empty() {
        Version::TLS_1_2
    } else {
        Version::TLS_1_3
    };
    let max = if versions.contains(&Version::TLS_1_3) {
        Version::TLS_1_3
    } else {
        Version::TLS_1_2
    };
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MetadataGenerator;
    use crate::params::{EidasMetadataRoleParameters, MetadataRole};
    use eidas_saml::signature::XmlSigner;
    use eidas_saml::SamlBinding;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = include_str!("../../../../testdata/proxy-key.pem");
    const CERT: &str = include_str!("../../../../testdata/proxy-cert.pem");
    const OTHER_CERT: &str = include_str!("../../../../testdata/connector-cert.pem");

    fn signed_metadata(entity_id: &str) -> String {
        let signer = XmlSigner::from_pem(KEY, CERT).unwrap();
        let params = EidasMetadataParameters::new(entity_id)
            .with_node_country("EU")
            .with_role(
                EidasMetadataRoleParameters::new(MetadataRole::Idp)
                    .with_signing_certificate(Certificate::from_pem(CERT).unwrap())
                    .with_endpoint(SamlBinding::HttpPost, "https://proxy.example.eu/post"),
            );
        MetadataGenerator::new(signer).generate(&params).unwrap()
    }

    fn settings() -> FetcherSettings {
        FetcherSettings::default().with_http_allowed(true)
    }

    async fn serve(server: &MockServer, body: String) {
        Mock::given(method("GET"))
            .and(path("/metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetches_and_validates_signed_metadata() {
        let server = MockServer::start().await;
        let url = format!("{}/metadata", server.uri());
        serve(&server, signed_metadata(&url)).await;

        let trusted = vec![Certificate::from_pem(CERT).unwrap()];
        let fetcher = HttpMetadataFetcher::new(settings(), trusted).unwrap();
        let params = fetcher.get_metadata(&url).await.unwrap();

        assert_eq!(params.entity_id, url);
        assert_eq!(params.node_country.as_deref(), Some("EU"));
        assert_eq!(params.signing_certificates().len(), 1);
    }

    #[tokio::test]
    async fn untrusted_signer_is_rejected() {
        let server = MockServer::start().await;
        let url = format!("{}/metadata", server.uri());
        serve(&server, signed_metadata(&url)).await;

        let trusted = vec![Certificate::from_pem(OTHER_CERT).unwrap()];
        let fetcher = HttpMetadataFetcher::new(settings(), trusted).unwrap();
        let err = fetcher.get_metadata(&url).await.unwrap_err();
        assert!(matches!(err, MetadataError::Signature(_)));
        assert_eq!(err.error_key(), "SAML_ENGINE_INVALID_METADATA");
    }

    #[tokio::test]
    async fn signature_check_can_be_disabled() {
        let server = MockServer::start().await;
        let url = format!("{}/metadata", server.uri());
        serve(&server, signed_metadata(&url)).await;

        let fetcher =
            HttpMetadataFetcher::new(settings().with_signature_validation(false), Vec::new()).unwrap();
        assert!(fetcher.get_metadata(&url).await.is_ok());
    }

    #[tokio::test]
    async fn metadata_for_another_entity_is_rejected() {
        let server = MockServer::start().await;
        let url = format!("{}/metadata", server.uri());
        serve(&server, signed_metadata("https://other.example.eu/metadata")).await;

        let trusted = vec![Certificate::from_pem(CERT).unwrap()];
        let fetcher = HttpMetadataFetcher::new(settings(), trusted).unwrap();
        let err = fetcher.get_metadata(&url).await.unwrap_err();
        assert!(matches!(err, MetadataError::Invalid(msg) if msg.contains("other.example.eu")));
    }

    #[tokio::test]
    async fn http_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpMetadataFetcher::new(settings(), Vec::new()).unwrap();
        let err = fetcher
            .get_metadata(&format!("{}/metadata", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::Fetch(_)));
    }

    #[tokio::test]
    async fn insecure_url_is_not_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let fetcher =
            HttpMetadataFetcher::new(settings().with_http_allowed(false), Vec::new()).unwrap();
        let err = fetcher
            .get_metadata(&format!("{}/metadata", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::InvalidSource(_)));
    }

    #[test]
    fn tls_bounds_from_protocols() {
        let names = |v: &[&str]| v.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        assert_eq!(tls_bounds(&names(&["TLSv1.2"])), (Version::TLS_1_2, Version::TLS_1_2));
        assert_eq!(
            tls_bounds(&names(&["TLSv1.2", "TLSv1.3"])),
            (Version::TLS_1_2, Version::TLS_1_3)
        );
        assert_eq!(tls_bounds(&names(&["TLSv1.3"])), (Version::TLS_1_3, Version::TLS_1_3));
        assert_eq!(tls_bounds(&names(&["SSLv3"])), (Version::TLS_1_2, Version::TLS_1_2));
    }
}
