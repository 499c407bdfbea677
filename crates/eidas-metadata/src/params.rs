//! Typed view of an eIDAS entity descriptor.

use chrono::{DateTime, Utc};
use eidas_crypto::Certificate;
use eidas_saml::validation::RequesterMetadata;
use eidas_saml::{SamlBinding, SpType};
use serde::{Deserialize, Serialize};

/// Namespace of `alg:SigningMethod` and `alg:DigestMethod`.
pub const ALG_NS: &str = "urn:oasis:names:tc:SAML:metadata:algsupport";

/// Namespace of `mdattr:EntityAttributes`.
pub const MDATTR_NS: &str = "urn:oasis:names:tc:SAML:metadata:attribute";

/// Entity attribute carrying the levels of assurance.
pub const LEVEL_OF_ASSURANCE_NAME: &str = "urn:oasis:names:tc:SAML:attribute:assurance-certification";

/// Entity attribute carrying the eIDAS protocol versions.
pub const PROTOCOL_VERSION_URI: &str = "http://eidas.europa.eu/entity-attributes/protocol-version";

/// Entity attribute carrying the eIDAS application identifiers.
pub const APPLICATION_IDENTIFIER: &str = "http://eidas.europa.eu/entity-attributes/application-identifier";

/// Entity category attribute.
pub const ENTITY_CATEGORY_ATTRIBUTE_NAME: &str = "http://macedir.org/entity-category";

/// Entity category value requiring a `RequesterID` in requests.
pub const REQUESTER_ID_FLAG_VALUE: &str = "http://eidas.europa.eu/entity-attributes/termsofaccess/requesterid";

/// SSO role of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataRole {
    /// `SPSSODescriptor`, published by connectors.
    Sp,
    /// `IDPSSODescriptor`, published by proxy services.
    Idp,
}

impl MetadataRole {
    /// Returns the descriptor element's local name.
    #[must_use]
    pub const fn descriptor_name(self) -> &'static str {
        match self {
            Self::Sp => "SPSSODescriptor",
            Self::Idp => "IDPSSODescriptor",
        }
    }

    /// Returns the endpoint element's local name.
    #[must_use]
    pub const fn endpoint_name(self) -> &'static str {
        match self {
            Self::Sp => "AssertionConsumerService",
            Self::Idp => "SingleSignOnService",
        }
    }
}

/// `md:Organization` content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationData {
    /// Organization name.
    pub name: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Organization URL.
    pub url: Option<String>,
}

/// `md:ContactPerson` content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactData {
    /// `contactType`, e.g. `technical` or `support`.
    pub contact_type: String,
    /// Company.
    pub company: Option<String>,
    /// Given name.
    pub given_name: Option<String>,
    /// Surname.
    pub surname: Option<String>,
    /// E-mail address.
    pub email: Option<String>,
    /// Telephone number.
    pub phone: Option<String>,
}

impl ContactData {
    /// Creates an empty contact of the given type.
    #[must_use]
    pub fn new(contact_type: impl Into<String>) -> Self {
        Self {
            contact_type: contact_type.into(),
            company: None,
            given_name: None,
            surname: None,
            email: None,
            phone: None,
        }
    }

    /// Sets the e-mail address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the company.
    #[must_use]
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }
}

/// One SSO role of an entity.
#[derive(Debug, Clone)]
pub struct EidasMetadataRoleParameters {
    /// Role of the descriptor.
    pub role: MetadataRole,
    /// Certificate peers use to validate this role's signatures.
    pub signing_certificate: Option<Certificate>,
    /// Certificate peers encrypt assertions for.
    pub encryption_certificate: Option<Certificate>,
    /// Endpoints by binding, in document order.
    pub protocol_bindings: Vec<(SamlBinding, String)>,
    /// Binding used when a peer has no preference.
    pub default_binding: Option<SamlBinding>,
    /// `WantAssertionsSigned` of an SP descriptor.
    pub want_assertions_signed: bool,
    /// `AuthnRequestsSigned` of an SP descriptor, or
    /// `WantAuthnRequestsSigned` of an IdP descriptor.
    pub authn_requests_signed: bool,
    /// Name URIs of the attributes an IdP supports.
    pub supported_attributes: Vec<String>,
    /// Supported NameID formats.
    pub name_id_formats: Vec<String>,
}

impl EidasMetadataRoleParameters {
    /// Creates a role without certificates or endpoints.
    #[must_use]
    pub const fn new(role: MetadataRole) -> Self {
        Self {
            role,
            signing_certificate: None,
            encryption_certificate: None,
            protocol_bindings: Vec::new(),
            default_binding: None,
            want_assertions_signed: true,
            authn_requests_signed: true,
            supported_attributes: Vec::new(),
            name_id_formats: Vec::new(),
        }
    }

    /// Adds an endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, binding: SamlBinding, location: impl Into<String>) -> Self {
        self.protocol_bindings.push((binding, location.into()));
        self
    }

    /// Sets the signing certificate.
    #[must_use]
    pub fn with_signing_certificate(mut self, certificate: Certificate) -> Self {
        self.signing_certificate = Some(certificate);
        self
    }

    /// Sets the encryption certificate.
    #[must_use]
    pub fn with_encryption_certificate(mut self, certificate: Certificate) -> Self {
        self.encryption_certificate = Some(certificate);
        self
    }

    /// Sets the default binding.
    #[must_use]
    pub const fn with_default_binding(mut self, binding: SamlBinding) -> Self {
        self.default_binding = Some(binding);
        self
    }

    /// Adds a supported attribute name URI.
    #[must_use]
    pub fn with_supported_attribute(mut self, name_uri: impl Into<String>) -> Self {
        self.supported_attributes.push(name_uri.into());
        self
    }

    /// Returns the endpoint location for `binding`.
    #[must_use]
    pub fn location(&self, binding: SamlBinding) -> Option<&str> {
        self.protocol_bindings
            .iter()
            .find(|(b, _)| *b == binding)
            .map(|(_, location)| location.as_str())
    }

    /// Returns the endpoint of the default binding, or the first endpoint.
    #[must_use]
    pub fn default_location(&self) -> Option<&str> {
        self.default_binding
            .and_then(|binding| self.location(binding))
            .or_else(|| self.protocol_bindings.first().map(|(_, location)| location.as_str()))
    }
}

/// Everything an eIDAS node learns from, or publishes in, its metadata.
#[derive(Debug, Clone, Default)]
pub struct EidasMetadataParameters {
    /// `entityID`, the metadata URL by convention.
    pub entity_id: String,
    /// `validUntil` of the descriptor.
    pub valid_until: Option<DateTime<Utc>>,
    /// Published levels of assurance.
    pub assurance_levels: Vec<String>,
    /// Supported signing algorithm URIs.
    pub signing_methods: Vec<String>,
    /// Supported digest algorithm URIs.
    pub digest_methods: Vec<String>,
    /// Sector of a connector.
    pub sp_type: Option<SpType>,
    /// Country served by the node.
    pub node_country: Option<String>,
    /// Organization.
    pub organization: Option<OrganizationData>,
    /// Contacts.
    pub contacts: Vec<ContactData>,
    /// SSO roles.
    pub role_descriptors: Vec<EidasMetadataRoleParameters>,
    /// eIDAS protocol versions.
    pub protocol_versions: Vec<String>,
    /// eIDAS application identifiers.
    pub application_identifiers: Vec<String>,
    /// Whether requests must carry a `RequesterID`.
    pub requester_id_flag: bool,
}

impl EidasMetadataParameters {
    /// Creates parameters for `entity_id`.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            ..Self::default()
        }
    }

    /// Sets `validUntil`.
    #[must_use]
    pub const fn with_valid_until(mut self, valid_until: DateTime<Utc>) -> Self {
        self.valid_until = Some(valid_until);
        self
    }

    /// Sets the node country.
    #[must_use]
    pub fn with_node_country(mut self, country: impl Into<String>) -> Self {
        self.node_country = Some(country.into());
        self
    }

    /// Sets the SP type.
    #[must_use]
    pub const fn with_sp_type(mut self, sp_type: SpType) -> Self {
        self.sp_type = Some(sp_type);
        self
    }

    /// Adds a level of assurance.
    #[must_use]
    pub fn with_assurance_level(mut self, level: impl Into<String>) -> Self {
        self.assurance_levels.push(level.into());
        self
    }

    /// Adds a role descriptor.
    #[must_use]
    pub fn with_role(mut self, role: EidasMetadataRoleParameters) -> Self {
        self.role_descriptors.push(role);
        self
    }

    /// Returns the descriptor for `role`.
    #[must_use]
    pub fn role(&self, role: MetadataRole) -> Option<&EidasMetadataRoleParameters> {
        self.role_descriptors.iter().find(|r| r.role == role)
    }

    /// Returns all signing certificates, used to trust this entity's
    /// messages.
    #[must_use]
    pub fn signing_certificates(&self) -> Vec<Certificate> {
        self.role_descriptors
            .iter()
            .filter_map(|r| r.signing_certificate.clone())
            .collect()
    }

    /// Returns the first encryption certificate.
    #[must_use]
    pub fn encryption_certificate(&self) -> Option<&Certificate> {
        self.role_descriptors
            .iter()
            .find_map(|r| r.encryption_certificate.as_ref())
    }

    /// Returns what request validation needs to know about this entity as
    /// a requester: its SP type and assertion consumer service URLs.
    #[must_use]
    pub fn requester_metadata(&self) -> RequesterMetadata {
        RequesterMetadata {
            entity_id: self.entity_id.clone(),
            sp_type: self.sp_type,
            assertion_consumer_service_urls: self
                .role(MetadataRole::Sp)
                .map(|sp| sp.protocol_bindings.iter().map(|(_, url)| url.clone()).collect())
                .unwrap_or_default(),
        }
    }

    /// Returns whether the metadata is valid at `now`: no `validUntil`, or
    /// `now` strictly before it.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_none_or(|until| now < until)
    }

    /// Returns whether the metadata is still valid.
    #[must_use]
    pub fn is_valid_until_now(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}
