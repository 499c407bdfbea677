//! Provisioned metadata.

use std::collections::HashMap;

use async_trait::async_trait;
use eidas_crypto::Certificate;
use eidas_saml::signature::XmlSignatureValidator;
use tracing::debug;

use super::MetadataFetcher;
use crate::error::{MetadataError, MetadataResult};
use crate::params::EidasMetadataParameters;
use crate::parser::MetadataParser;

/// Metadata loaded at startup and served without network access.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadataSource {
    entries: HashMap<String, EidasMetadataParameters>,
}

impl StaticMetadataSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds metadata keyed by its entity ID.
    #[must_use]
    pub fn with_metadata(mut self, params: EidasMetadataParameters) -> Self {
        self.insert(params);
        self
    }

    /// Adds metadata keyed by its entity ID, replacing a previous entry.
    pub fn insert(&mut self, params: EidasMetadataParameters) {
        debug!(entity_id = %params.entity_id, "provisioned metadata loaded");
        self.entries.insert(params.entity_id.clone(), params);
    }

    /// Parses and adds signed documents. Every document must be signed by
    /// one of `trusted_signers`.
    pub fn load_documents<'a>(
        &mut self,
        documents: impl IntoIterator<Item = &'a str>,
        trusted_signers: &[Certificate],
    ) -> MetadataResult<()> {
        let validator = XmlSignatureValidator::new(trusted_signers.to_vec());
        for xml in documents {
            let root = validator
                .validate(xml)
                .map_err(|e| MetadataError::Signature(e.to_string()))?;
            self.insert(MetadataParser::from_element(&root)?);
        }
        Ok(())
    }

    /// Returns the entry for `url`.
    #[must_use]
    pub fn lookup(&self, url: &str) -> Option<&EidasMetadataParameters> {
        self.entries.get(url)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the source is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MetadataFetcher for StaticMetadataSource {
    async fn get_metadata(&self, url: &str) -> MetadataResult<EidasMetadataParameters> {
        self.lookup(url)
            .cloned()
            .ok_or_else(|| MetadataError::NoMetadata(url.to_string()))
    }
}
