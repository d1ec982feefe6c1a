use json_patch::Patch;
use serde::{Deserialize, Serialize};

use super::Patchable;
use crate::{
    builder::{NullPolicy, PatchBuilder},
    criteria::RoleMembership,
    error::PatchError,
    optionality::Optionality,
    value::Reference,
};

/// A collection of access profiles and entitlements, granted by membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub description: Optionality<String>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub owner: Optionality<Reference>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub access_profiles: Optionality<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub entitlements: Optionality<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub membership: Optionality<RoleMembership>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub enabled: Optionality<bool>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub requestable: Optionality<bool>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub dimensional: Optionality<bool>,
}

impl Role {
    pub fn new(name: &str) -> Self {
        Role {
            name: name.to_string(),
            description: Optionality::Unset,
            owner: Optionality::Unset,
            access_profiles: Optionality::Unset,
            entitlements: Optionality::Unset,
            membership: Optionality::Unset,
            enabled: Optionality::Unset,
            requestable: Optionality::Unset,
            dimensional: Optionality::Unset,
        }
    }
}

impl Patchable for Role {
    const KIND: &'static str = "roles";

    /// All optional fields are cleared with `remove`. `membership`, including
    /// its criteria tree, is always replaced as a whole.
    fn diff(old: &Self, new: &Self) -> Result<Patch, PatchError> {
        let mut b = PatchBuilder::new();
        b.required("name", &old.name, &new.name)?;
        b.optional("description", &old.description, &new.description, NullPolicy::Remove)?;
        b.optional("owner", &old.owner, &new.owner, NullPolicy::Remove)?;
        b.optional(
            "accessProfiles",
            &old.access_profiles,
            &new.access_profiles,
            NullPolicy::Remove,
        )?;
        b.optional("entitlements", &old.entitlements, &new.entitlements, NullPolicy::Remove)?;
        b.optional("membership", &old.membership, &new.membership, NullPolicy::Remove)?;
        b.optional("enabled", &old.enabled, &new.enabled, NullPolicy::Remove)?;
        b.optional("requestable", &old.requestable, &new.requestable, NullPolicy::Remove)?;
        b.optional("dimensional", &old.dimensional, &new.dimensional, NullPolicy::Remove)?;
        Ok(b.build())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if let Optionality::Value(membership) = &self.membership {
            membership.validate()?;
        }
        Ok(())
    }
}
