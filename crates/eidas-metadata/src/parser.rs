//! Entity descriptor parsing.

use eidas_crypto::Certificate;
use eidas_saml::xml::{self, Element, parse_bool, parse_instant};
use eidas_saml::{SamlBinding, SpType};
use tracing::debug;

use crate::error::{MetadataError, MetadataResult};
use crate::params::{
    APPLICATION_IDENTIFIER, ContactData, ENTITY_CATEGORY_ATTRIBUTE_NAME, EidasMetadataParameters,
    EidasMetadataRoleParameters, LEVEL_OF_ASSURANCE_NAME, MetadataRole, OrganizationData, PROTOCOL_VERSION_URI,
    REQUESTER_ID_FLAG_VALUE,
};

/// Reads `EntityDescriptor` documents into [`EidasMetadataParameters`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataParser;

impl MetadataParser {
    /// Parses a metadata document.
    pub fn parse(xml: &str) -> MetadataResult<EidasMetadataParameters> {
        Self::from_element(&xml::parse(xml)?)
    }

    /// Reads an already parsed `EntityDescriptor`.
    pub fn from_element(root: &Element) -> MetadataResult<EidasMetadataParameters> {
        if root.local_name() != "EntityDescriptor" {
            return Err(MetadataError::Invalid(format!(
                "expected EntityDescriptor, found {}",
                root.local_name()
            )));
        }
        let entity_id = root
            .attr("entityID")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MetadataError::Invalid("entityID is missing".to_string()))?;

        let mut params = EidasMetadataParameters::new(entity_id);
        params.valid_until = root.attr("validUntil").map(parse_instant).transpose()?;

        if let Some(extensions) = root.child("Extensions") {
            read_extensions(extensions, &mut params)?;
        }
        for role in [MetadataRole::Sp, MetadataRole::Idp] {
            for descriptor in root.children_named(role.descriptor_name()) {
                if params.node_country.is_none() {
                    params.node_country = descriptor
                        .child("Extensions")
                        .and_then(|e| e.child_text("NodeCountry"))
                        .map(|c| c.trim().to_string());
                }
                params.role_descriptors.push(read_role(descriptor, role)?);
            }
        }
        params.organization = root.child("Organization").map(read_organization);
        params.contacts = root.children_named("ContactPerson").map(read_contact).collect();

        debug!(
            entity_id = %params.entity_id,
            roles = params.role_descriptors.len(),
            "metadata parsed"
        );
        Ok(params)
    }
}

fn read_extensions(extensions: &Element, params: &mut EidasMetadataParameters) -> MetadataResult<()> {
    for child in extensions.elements() {
        match child.local_name() {
            "EntityAttributes" => {
                for attribute in child.children_named("Attribute") {
                    let values = attribute_values(attribute);
                    match attribute.attr("Name").unwrap_or_default() {
                        LEVEL_OF_ASSURANCE_NAME => params.assurance_levels.extend(values),
                        PROTOCOL_VERSION_URI => params.protocol_versions.extend(values),
                        APPLICATION_IDENTIFIER => params.application_identifiers.extend(values),
                        ENTITY_CATEGORY_ATTRIBUTE_NAME => {
                            params.requester_id_flag |= values.iter().any(|v| v == REQUESTER_ID_FLAG_VALUE);
                        }
                        _ => {}
                    }
                }
            }
            "SPType" => {
                let value = child.text();
                params.sp_type = Some(
                    SpType::parse(&value)
                        .ok_or_else(|| MetadataError::Invalid(format!("unknown SPType '{}'", value.trim())))?,
                );
            }
            "NodeCountry" => params.node_country = Some(child.text().trim().to_string()),
            "DigestMethod" => params.digest_methods.extend(child.attr("Algorithm").map(str::to_string)),
            "SigningMethod" => params.signing_methods.extend(child.attr("Algorithm").map(str::to_string)),
            _ => {}
        }
    }
    Ok(())
}

fn attribute_values(attribute: &Element) -> Vec<String> {
    attribute
        .children_named("AttributeValue")
        .map(|v| v.text().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn read_role(descriptor: &Element, role: MetadataRole) -> MetadataResult<EidasMetadataRoleParameters> {
    let mut params = EidasMetadataRoleParameters::new(role);
    let flag = |name: &str| descriptor.attr(name).and_then(parse_bool).unwrap_or(false);
    match role {
        MetadataRole::Sp => {
            params.authn_requests_signed = flag("AuthnRequestsSigned");
            params.want_assertions_signed = flag("WantAssertionsSigned");
        }
        MetadataRole::Idp => {
            params.authn_requests_signed = flag("WantAuthnRequestsSigned");
            params.want_assertions_signed = false;
        }
    }

    for key in descriptor.children_named("KeyDescriptor") {
        let Some(certificate) = key_certificate(key)? else {
            continue;
        };
        match key.attr("use") {
            Some("signing") => params.signing_certificate = Some(certificate),
            Some("encryption") => params.encryption_certificate = Some(certificate),
            _ => {
                params.signing_certificate.get_or_insert_with(|| certificate.clone());
                params.encryption_certificate.get_or_insert(certificate);
            }
        }
    }

    params.name_id_formats = descriptor
        .children_named("NameIDFormat")
        .map(|f| f.text().trim().to_string())
        .collect();

    for endpoint in descriptor.children_named(role.endpoint_name()) {
        let binding_uri = endpoint.attr("Binding").unwrap_or_default();
        let Some(binding) = SamlBinding::from_uri(binding_uri) else {
            debug!(binding = %binding_uri, "skipping endpoint with unsupported binding");
            continue;
        };
        let location = endpoint
            .attr("Location")
            .ok_or_else(|| MetadataError::Invalid(format!("{} has no Location", role.endpoint_name())))?;
        if endpoint.attr("isDefault").and_then(parse_bool) == Some(true) {
            params.default_binding = Some(binding);
        }
        params.protocol_bindings.push((binding, location.to_string()));
    }

    if role == MetadataRole::Idp {
        params.supported_attributes = descriptor
            .children_named("Attribute")
            .filter_map(|a| a.attr("Name"))
            .map(str::to_string)
            .collect();
    }
    Ok(params)
}

fn key_certificate(key: &Element) -> MetadataResult<Option<Certificate>> {
    let Some(value) = key
        .child("KeyInfo")
        .and_then(|info| info.child("X509Data"))
        .and_then(|data| data.child_text("X509Certificate"))
    else {
        return Ok(None);
    };
    Certificate::from_base64(&value)
        .map(Some)
        .map_err(|e| MetadataError::Invalid(format!("invalid key descriptor certificate: {e}")))
}

fn read_organization(element: &Element) -> OrganizationData {
    OrganizationData {
        name: element.child_text("OrganizationName"),
        display_name: element.child_text("OrganizationDisplayName"),
        url: element.child_text("OrganizationURL"),
    }
}

fn read_contact(element: &Element) -> ContactData {
    ContactData {
        contact_type: element.attr("contactType").unwrap_or("other").to_string(),
        company: element.child_text("Company"),
        given_name: element.child_text("GivenName"),
        surname: element.child_text("SurName"),
        email: element.child_text("EmailAddress"),
        phone: element.child_text("TelephoneNumber"),
    }
}
