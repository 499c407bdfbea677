//! Key material of the node.
//!
//! Keys and certificates are read once at startup from the PEM files named
//! in the SAML configuration.

use std::path::Path;

use anyhow::Context;
use eidas_core::config::SamlConfig;
use eidas_crypto::{Certificate, SignatureAlgorithm};
use eidas_saml::encryption::{DecryptionCredential, EncryptionConfiguration};
use eidas_saml::signature::XmlSigner;

/// PEM encoded keys and certificates of the node.
#[derive(Clone)]
pub struct NodeCredentials {
    signing_key_pem: String,
    signing_cert_pem: String,
    decryption: Option<(String, String)>,
    signature_algorithm: Option<SignatureAlgorithm>,
}

impl std::fmt::Debug for NodeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCredentials")
            .field("decryption", &self.decryption.is_some())
            .field("signature_algorithm", &self.signature_algorithm)
            .finish_non_exhaustive()
    }
}

fn read_pem(path: &str, what: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(Path::new(path)).with_context(|| format!("failed to read {what} from {path}"))
}

impl NodeCredentials {
    /// Creates credentials from PEM strings.
    #[must_use]
    pub fn new(signing_key_pem: impl Into<String>, signing_cert_pem: impl Into<String>) -> Self {
        Self {
            signing_key_pem: signing_key_pem.into(),
            signing_cert_pem: signing_cert_pem.into(),
            decryption: None,
            signature_algorithm: None,
        }
    }

    /// Adds the key pair used to decrypt incoming assertions.
    #[must_use]
    pub fn with_decryption(mut self, key_pem: impl Into<String>, cert_pem: impl Into<String>) -> Self {
        self.decryption = Some((key_pem.into(), cert_pem.into()));
        self
    }

    /// Selects the signature algorithm.
    #[must_use]
    pub const fn with_signature_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.signature_algorithm = Some(algorithm);
        self
    }

    /// Loads the files named in `config`. The signing pair is mandatory.
    pub fn load(config: &SamlConfig) -> anyhow::Result<Self> {
        let key_path = config
            .signing_key_path
            .as_deref()
            .context("EIDAS_SIGNING_KEY is required")?;
        let cert_path = config
            .signing_cert_path
            .as_deref()
            .context("EIDAS_SIGNING_CERT is required")?;

        let mut credentials = Self::new(
            read_pem(key_path, "signing key")?,
            read_pem(cert_path, "signing certificate")?,
        );
        if let (Some(key), Some(cert)) = (&config.decryption_key_path, &config.decryption_cert_path) {
            credentials = credentials.with_decryption(
                read_pem(key, "decryption key")?,
                read_pem(cert, "decryption certificate")?,
            );
        }
        if let Some(algorithm) = SignatureAlgorithm::from_uri(&config.signature_algorithm) {
            credentials = credentials.with_signature_algorithm(algorithm);
        } else {
            tracing::warn!(algorithm = %config.signature_algorithm, "unknown signature algorithm, using the key default");
        }
        Ok(credentials)
    }

    /// Builds a signer over the signing pair.
    pub fn signer(&self) -> anyhow::Result<XmlSigner> {
        let signer = XmlSigner::from_pem(&self.signing_key_pem, &self.signing_cert_pem)
            .context("invalid signing credentials")?;
        Ok(match self.signature_algorithm {
            Some(algorithm) => signer.with_algorithm(algorithm),
            None => signer,
        })
    }

    /// Returns the signing certificate.
    pub fn signing_certificate(&self) -> anyhow::Result<Certificate> {
        Certificate::from_pem(&self.signing_cert_pem).context("invalid signing certificate")
    }

    /// Returns the decryption certificate, advertised as encryption
    /// certificate in the node metadata.
    pub fn decryption_certificate(&self) -> anyhow::Result<Option<Certificate>> {
        self.decryption
            .as_ref()
            .map(|(_, cert)| Certificate::from_pem(cert).context("invalid decryption certificate"))
            .transpose()
    }

    /// Builds the engine encryption settings with the decryption key loaded.
    pub fn encryption_configuration(&self, config: &SamlConfig) -> anyhow::Result<EncryptionConfiguration> {
        let mut encryption = EncryptionConfiguration::from_saml_config(config)?;
        if let Some((key, cert)) = &self.decryption {
            encryption
                .decryption_credentials
                .push(DecryptionCredential::from_pem(key, cert).context("invalid decryption credentials")?);
        }
        Ok(encryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = include_str!("../../../testdata/proxy-key.pem");
    const CERT: &str = include_str!("../../../testdata/proxy-cert.pem");

    #[test]
    fn signer_and_certificates() {
        let credentials = NodeCredentials::new(KEY, CERT).with_decryption(KEY, CERT);
        assert!(credentials.signer().is_ok());
        let decryption = credentials.decryption_certificate().unwrap().unwrap();
        assert_eq!(credentials.signing_certificate().unwrap().subject(), decryption.subject());

        let encryption = credentials.encryption_configuration(&SamlConfig::default()).unwrap();
        assert_eq!(encryption.decryption_credentials.len(), 1);
    }

    #[test]
    fn missing_signing_key_is_reported() {
        let err = NodeCredentials::load(&SamlConfig::default()).unwrap_err();
        assert!(err.to_string().contains("EIDAS_SIGNING_KEY"));
    }

    #[test]
    fn load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("key.pem");
        let cert = dir.path().join("cert.pem");
        std::fs::write(&key, KEY).unwrap();
        std::fs::write(&cert, CERT).unwrap();

        let config = SamlConfig {
            signing_key_path: Some(key.display().to_string()),
            signing_cert_path: Some(cert.display().to_string()),
            ..SamlConfig::default()
        };
        let credentials = NodeCredentials::load(&config).unwrap();
        assert!(credentials.decryption_certificate().unwrap().is_none());
        assert!(credentials.signer().is_ok());
    }
}
