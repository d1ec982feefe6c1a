use json_patch::Patch;
use serde::{Deserialize, Serialize};

use super::Patchable;
use crate::{
    builder::{NullPolicy, PatchBuilder},
    error::PatchError,
    optionality::Optionality,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailNotificationOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_managers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_all_admins: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_specific_users: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAction {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_source_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_sources: Option<bool>,
}

/// A stage of an identity's lifecycle within an identity profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleState {
    pub name: String,
    pub technical_name: String,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub description: Optionality<String>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub enabled: Optionality<bool>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub identity_count: Optionality<i32>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub access_profile_ids: Optionality<Vec<String>>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub email_notification_option: Optionality<EmailNotificationOption>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub account_actions: Optionality<Vec<AccountAction>>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub identity_state: Optionality<String>,
}

impl LifecycleState {
    pub fn new(name: &str, technical_name: &str) -> Self {
        LifecycleState {
            name: name.to_string(),
            technical_name: technical_name.to_string(),
            description: Optionality::Unset,
            enabled: Optionality::Unset,
            identity_count: Optionality::Unset,
            access_profile_ids: Optionality::Unset,
            email_notification_option: Optionality::Unset,
            account_actions: Optionality::Unset,
            identity_state: Optionality::Unset,
        }
    }
}

impl Patchable for LifecycleState {
    const KIND: &'static str = "lifecycle-states";

    /// `description` and `identityState` are cleared by writing `null`; the
    /// API rejects `remove` on them. Other optional fields use `remove`.
    ///
    /// `identityCount` is computed by the server.
    fn diff(old: &Self, new: &Self) -> Result<Patch, PatchError> {
        let mut b = PatchBuilder::new();
        b.required("name", &old.name, &new.name)?;
        b.required("technicalName", &old.technical_name, &new.technical_name)?;
        b.optional(
            "description",
            &old.description,
            &new.description,
            NullPolicy::ReplaceWithNull,
        )?;
        b.optional("enabled", &old.enabled, &new.enabled, NullPolicy::Remove)?;
        b.optional(
            "identityCount",
            &old.identity_count,
            &new.identity_count,
            NullPolicy::Remove,
        )?;
        b.optional(
            "accessProfileIds",
            &old.access_profile_ids,
            &new.access_profile_ids,
            NullPolicy::Remove,
        )?;
        b.optional(
            "emailNotificationOption",
            &old.email_notification_option,
            &new.email_notification_option,
            NullPolicy::Remove,
        )?;
        b.optional(
            "accountActions",
            &old.account_actions,
            &new.account_actions,
            NullPolicy::Remove,
        )?;
        b.optional(
            "identityState",
            &old.identity_state,
            &new.identity_state,
            NullPolicy::ReplaceWithNull,
        )?;
        Ok(b.build())
    }

    fn mark_server_computed_unknown(&mut self) {
        self.identity_count = Optionality::Unknown;
    }
}
