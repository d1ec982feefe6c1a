use json_patch::Patch;
use serde::{Deserialize, Serialize};

use super::Patchable;
use crate::{
    builder::{NullPolicy, PatchBuilder},
    error::PatchError,
    optionality::Optionality,
    value::Reference,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalScheme {
    pub approver_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequestConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_comments_required: Option<bool>,
    #[serde(default)]
    pub approval_schemes: Vec<ApprovalScheme>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRequestConfig {
    #[serde(default)]
    pub approval_schemes: Vec<ApprovalScheme>,
}

/// A bundle of entitlements from one source that can be requested as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub description: Optionality<String>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub owner: Optionality<Reference>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub source: Optionality<Reference>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub entitlements: Optionality<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub enabled: Optionality<bool>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub requestable: Optionality<bool>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub access_request_config: Optionality<AccessRequestConfig>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub revocation_request_config: Optionality<RevocationRequestConfig>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub segments: Optionality<Vec<String>>,
}

impl AccessProfile {
    pub fn new(name: &str) -> Self {
        AccessProfile {
            name: name.to_string(),
            description: Optionality::Unset,
            owner: Optionality::Unset,
            source: Optionality::Unset,
            entitlements: Optionality::Unset,
            enabled: Optionality::Unset,
            requestable: Optionality::Unset,
            access_request_config: Optionality::Unset,
            revocation_request_config: Optionality::Unset,
            segments: Optionality::Unset,
        }
    }
}

impl Patchable for AccessProfile {
    const KIND: &'static str = "access-profiles";

    /// All optional fields are cleared with `remove`.
    ///
    /// The API checks that every entitlement belongs to the profile's source,
    /// so a new `source` is always followed by the full entitlement list in
    /// the same patch, even when the list itself did not change.
    ///
    /// The request configs are compared structurally.
    fn diff(old: &Self, new: &Self) -> Result<Patch, PatchError> {
        let mut b = PatchBuilder::new();
        b.required("name", &old.name, &new.name)?;
        b.optional("description", &old.description, &new.description, NullPolicy::Remove)?;
        b.optional("owner", &old.owner, &new.owner, NullPolicy::Remove)?;
        if b.optional("source", &old.source, &new.source, NullPolicy::Remove)? {
            b.coupled("entitlements", &old.entitlements, &new.entitlements, NullPolicy::Remove)?;
        } else {
            b.optional("entitlements", &old.entitlements, &new.entitlements, NullPolicy::Remove)?;
        }
        b.optional("enabled", &old.enabled, &new.enabled, NullPolicy::Remove)?;
        b.optional("requestable", &old.requestable, &new.requestable, NullPolicy::Remove)?;
        b.optional(
            "accessRequestConfig",
            &old.access_request_config,
            &new.access_request_config,
            NullPolicy::Remove,
        )?;
        b.optional(
            "revocationRequestConfig",
            &old.revocation_request_config,
            &new.revocation_request_config,
            NullPolicy::Remove,
        )?;
        b.optional("segments", &old.segments, &new.segments, NullPolicy::Remove)?;
        Ok(b.build())
    }
}
