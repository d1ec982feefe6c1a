use std::collections::BTreeMap;

use json_patch::Patch;
use serde::{Deserialize, Serialize};

use super::Patchable;
use crate::{
    builder::{NullPolicy, PatchBuilder},
    error::PatchError,
    optionality::Optionality,
    value::{AttributeValue, Reference},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformDefinition {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityAttributeTransform {
    pub identity_attribute_name: String,
    pub transform_definition: TransformDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityAttributeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub attribute_transforms: Vec<IdentityAttributeTransform>,
}

/// Maps accounts of an authoritative source onto identities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub description: Optionality<String>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub owner: Optionality<Reference>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub priority: Optionality<i64>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub authoritative_source: Optionality<Reference>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub identity_refresh_required: Optionality<bool>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub identity_attribute_config: Optionality<IdentityAttributeConfig>,
}

impl IdentityProfile {
    pub fn new(name: &str) -> Self {
        IdentityProfile {
            name: name.to_string(),
            description: Optionality::Unset,
            owner: Optionality::Unset,
            priority: Optionality::Unset,
            authoritative_source: Optionality::Unset,
            identity_refresh_required: Optionality::Unset,
            identity_attribute_config: Optionality::Unset,
        }
    }
}

impl Patchable for IdentityProfile {
    const KIND: &'static str = "identity-profiles";

    /// `description` does not support `remove` and is cleared by writing
    /// `null`. Other optional fields are cleared with `remove`.
    ///
    /// The attribute mappings refer to account attributes of the
    /// authoritative source, so a new `authoritativeSource` is always
    /// followed by the full `identityAttributeConfig`.
    ///
    /// `identityRefreshRequired` is computed by the server.
    fn diff(old: &Self, new: &Self) -> Result<Patch, PatchError> {
        let mut b = PatchBuilder::new();
        b.required("name", &old.name, &new.name)?;
        b.optional(
            "description",
            &old.description,
            &new.description,
            NullPolicy::ReplaceWithNull,
        )?;
        b.optional("owner", &old.owner, &new.owner, NullPolicy::Remove)?;
        b.optional("priority", &old.priority, &new.priority, NullPolicy::Remove)?;
        let source_changed = b.optional(
            "authoritativeSource",
            &old.authoritative_source,
            &new.authoritative_source,
            NullPolicy::Remove,
        )?;
        b.optional(
            "identityRefreshRequired",
            &old.identity_refresh_required,
            &new.identity_refresh_required,
            NullPolicy::Remove,
        )?;
        if source_changed {
            b.coupled(
                "identityAttributeConfig",
                &old.identity_attribute_config,
                &new.identity_attribute_config,
                NullPolicy::Remove,
            )?;
        } else {
            b.optional(
                "identityAttributeConfig",
                &old.identity_attribute_config,
                &new.identity_attribute_config,
                NullPolicy::Remove,
            )?;
        }
        Ok(b.build())
    }

    fn mark_server_computed_unknown(&mut self) {
        self.identity_refresh_required = Optionality::Unknown;
    }
}
