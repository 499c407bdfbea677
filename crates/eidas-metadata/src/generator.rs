//! Signed entity descriptor generation.

use chrono::{DateTime, Duration, Utc};
use eidas_crypto::Certificate;
use eidas_crypto::random::generate_saml_id;
use eidas_saml::signature::XmlSigner;
use eidas_saml::xml::prefix::{DS, EIDAS, SAML};
use eidas_saml::xml::{self, Element, format_instant, qname};
use eidas_saml::{ATTRIBUTE_NAME_FORMAT_URI, EIDAS_NS, MD_NS, SAML_NS, SAMLP_NS, XMLDSIG_NS};
use tracing::debug;

use crate::error::MetadataResult;
use crate::params::{
    ALG_NS, APPLICATION_IDENTIFIER, ContactData, ENTITY_CATEGORY_ATTRIBUTE_NAME, EidasMetadataParameters,
    EidasMetadataRoleParameters, LEVEL_OF_ASSURANCE_NAME, MDATTR_NS, MetadataRole, OrganizationData,
    PROTOCOL_VERSION_URI, REQUESTER_ID_FLAG_VALUE,
};

const MD: &str = "md";
const ALG: &str = "alg";
const MDATTR: &str = "mdattr";

fn md(local: &str) -> Element {
    Element::new(qname(MD, local))
}

fn xmlns(prefix: &str) -> String {
    format!("xmlns:{prefix}")
}

/// Builds and signs the node's published metadata.
#[derive(Debug)]
pub struct MetadataGenerator {
    signer: XmlSigner,
    validity: Duration,
}

impl MetadataGenerator {
    /// Creates a generator signing with `signer`, publishing a one day
    /// validity unless the parameters carry their own `validUntil`.
    #[must_use]
    pub fn new(signer: XmlSigner) -> Self {
        Self {
            signer,
            validity: Duration::days(1),
        }
    }

    /// Sets the validity written when the parameters carry none.
    #[must_use]
    pub const fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Returns the unsigned entity descriptor.
    #[must_use]
    pub fn to_element(&self, params: &EidasMetadataParameters) -> Element {
        let valid_until = params.valid_until.unwrap_or_else(|| Utc::now() + self.validity);
        entity_descriptor(params, valid_until)
    }

    /// Returns the signed entity descriptor document.
    pub fn generate(&self, params: &EidasMetadataParameters) -> MetadataResult<String> {
        let unsigned = self.to_element(params);
        let mut root = xml::parse(&unsigned.to_document())?;
        self.signer.sign_element(&mut root)?;
        debug!(entity_id = %params.entity_id, "metadata generated");
        Ok(root.to_document())
    }
}

fn entity_descriptor(params: &EidasMetadataParameters, valid_until: DateTime<Utc>) -> Element {
    let mut root = md("EntityDescriptor")
        .with_attr(xmlns(MD), MD_NS)
        .with_attr(xmlns(DS), XMLDSIG_NS)
        .with_attr(xmlns(SAML), SAML_NS)
        .with_attr(xmlns(EIDAS), EIDAS_NS)
        .with_attr(xmlns(ALG), ALG_NS)
        .with_attr(xmlns(MDATTR), MDATTR_NS)
        .with_attr("ID", generate_saml_id())
        .with_attr("entityID", params.entity_id.as_str())
        .with_attr("validUntil", format_instant(&valid_until));

    let extensions = extensions(params);
    if extensions.elements().next().is_some() {
        root.push_child(extensions);
    }
    for role in &params.role_descriptors {
        root.push_child(role_descriptor(role, params.node_country.as_deref()));
    }
    if let Some(organization) = &params.organization {
        root.push_child(organization_element(organization));
    }
    for contact in &params.contacts {
        root.push_child(contact_element(contact));
    }
    root
}

fn extensions(params: &EidasMetadataParameters) -> Element {
    let mut extensions = md("Extensions");

    // Roles carry the country themselves; an entity without one keeps it here.
    let entity_country = params.node_country.as_deref().filter(|_| params.role_descriptors.is_empty());
    if let Some(country) = entity_country {
        extensions.push_child(Element::new(qname(EIDAS, "NodeCountry")).with_text(country));
    }

    let mut entity_attributes = Element::new(qname(MDATTR, "EntityAttributes"));
    for (name, values) in [
        (PROTOCOL_VERSION_URI, params.protocol_versions.as_slice()),
        (APPLICATION_IDENTIFIER, params.application_identifiers.as_slice()),
        (LEVEL_OF_ASSURANCE_NAME, params.assurance_levels.as_slice()),
    ] {
        if !values.is_empty() {
            entity_attributes.push_child(saml_attribute(name, values));
        }
    }
    if params.requester_id_flag {
        entity_attributes.push_child(saml_attribute(
            ENTITY_CATEGORY_ATTRIBUTE_NAME,
            &[REQUESTER_ID_FLAG_VALUE.to_string()],
        ));
    }
    if entity_attributes.elements().next().is_some() {
        extensions.push_child(entity_attributes);
    }

    if let Some(sp_type) = params.sp_type {
        extensions.push_child(Element::new(qname(EIDAS, "SPType")).with_text(sp_type.as_str()));
    }
    for digest in &params.digest_methods {
        extensions.push_child(Element::new(qname(ALG, "DigestMethod")).with_attr("Algorithm", digest.as_str()));
    }
    for signing in &params.signing_methods {
        extensions.push_child(Element::new(qname(ALG, "SigningMethod")).with_attr("Algorithm", signing.as_str()));
    }
    extensions
}

fn saml_attribute(name: &str, values: &[String]) -> Element {
    let mut attribute = Element::new(qname(SAML, "Attribute"))
        .with_attr("Name", name)
        .with_attr("NameFormat", ATTRIBUTE_NAME_FORMAT_URI);
    for value in values {
        attribute.push_child(Element::new(qname(SAML, "AttributeValue")).with_text(value.as_str()));
    }
    attribute
}

fn role_descriptor(role: &EidasMetadataRoleParameters, node_country: Option<&str>) -> Element {
    let mut descriptor = md(role.role.descriptor_name()).with_attr("protocolSupportEnumeration", SAMLP_NS);
    descriptor = match role.role {
        MetadataRole::Sp => descriptor
            .with_attr("AuthnRequestsSigned", role.authn_requests_signed.to_string())
            .with_attr("WantAssertionsSigned", role.want_assertions_signed.to_string()),
        MetadataRole::Idp => {
            descriptor.with_attr("WantAuthnRequestsSigned", role.authn_requests_signed.to_string())
        }
    };

    if let Some(country) = node_country {
        descriptor.push_child(
            md("Extensions").with_child(Element::new(qname(EIDAS, "NodeCountry")).with_text(country)),
        );
    }
    if let Some(certificate) = &role.signing_certificate {
        descriptor.push_child(key_descriptor("signing", certificate));
    }
    if let Some(certificate) = &role.encryption_certificate {
        descriptor.push_child(key_descriptor("encryption", certificate));
    }
    for format in &role.name_id_formats {
        descriptor.push_child(md("NameIDFormat").with_text(format.as_str()));
    }
    for (index, (binding, location)) in role.protocol_bindings.iter().enumerate() {
        let mut endpoint = md(role.role.endpoint_name())
            .with_attr("Binding", binding.uri())
            .with_attr("Location", location.as_str());
        if role.role == MetadataRole::Sp {
            endpoint.set_attr("index", index.to_string());
            endpoint.set_attr("isDefault", (role.default_binding == Some(*binding)).to_string());
        }
        descriptor.push_child(endpoint);
    }
    if role.role == MetadataRole::Idp {
        for name in &role.supported_attributes {
            descriptor.push_child(
                Element::new(qname(SAML, "Attribute"))
                    .with_attr("Name", name.as_str())
                    .with_attr("NameFormat", ATTRIBUTE_NAME_FORMAT_URI),
            );
        }
    }
    descriptor
}

fn key_descriptor(usage: &str, certificate: &Certificate) -> Element {
    md("KeyDescriptor").with_attr("use", usage).with_child(
        Element::new(qname(DS, "KeyInfo")).with_child(
            Element::new(qname(DS, "X509Data"))
                .with_child(Element::new(qname(DS, "X509Certificate")).with_text(certificate.to_base64())),
        ),
    )
}

fn organization_element(organization: &OrganizationData) -> Element {
    let localized = |local: &str, value: Option<&String>| {
        value.map(|v| md(local).with_attr("xml:lang", "en").with_text(v.as_str()))
    };
    md("Organization")
        .with_opt_child(localized("OrganizationName", organization.name.as_ref()))
        .with_opt_child(localized("OrganizationDisplayName", organization.display_name.as_ref()))
        .with_opt_child(localized("OrganizationURL", organization.url.as_ref()))
}

fn contact_element(contact: &ContactData) -> Element {
    let field = |local: &str, value: Option<&String>| value.map(|v| md(local).with_text(v.as_str()));
    md("ContactPerson")
        .with_attr("contactType", contact.contact_type.as_str())
        .with_opt_child(field("Company", contact.company.as_ref()))
        .with_opt_child(field("GivenName", contact.given_name.as_ref()))
        .with_opt_child(field("SurName", contact.surname.as_ref()))
        .with_opt_child(field("EmailAddress", contact.email.as_ref()))
        .with_opt_child(field("TelephoneNumber", contact.phone.as_ref()))
}
