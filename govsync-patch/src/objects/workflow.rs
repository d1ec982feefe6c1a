use json_patch::Patch;
use serde::{Deserialize, Serialize};

use super::Patchable;
use crate::{
    builder::{NullPolicy, PatchBuilder},
    error::PatchError,
    optionality::Optionality,
    value::{JsonBlob, Reference},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTrigger {
    #[serde(rename = "type")]
    pub type_: String,
    pub attributes: JsonBlob,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// An automation: a trigger plus a definition of steps.
///
/// The definition and the trigger attributes are authored as JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub name: String,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub description: Optionality<String>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub owner: Optionality<Reference>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub enabled: Optionality<bool>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub definition: Optionality<JsonBlob>,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub trigger: Optionality<WorkflowTrigger>,
}

impl Workflow {
    pub fn new(name: &str) -> Self {
        Workflow {
            name: name.to_string(),
            description: Optionality::Unset,
            owner: Optionality::Unset,
            enabled: Optionality::Unset,
            definition: Optionality::Unset,
            trigger: Optionality::Unset,
        }
    }

    /// Only the desired side is checked: a malformed blob on the observed
    /// side compares unequal and is overwritten.
    fn check_blobs(&self) -> Result<(), PatchError> {
        if let Optionality::Value(definition) = &self.definition {
            definition.parse_field("/definition")?;
        }
        if let Optionality::Value(trigger) = &self.trigger {
            trigger.attributes.parse_field("/trigger/attributes")?;
        }
        Ok(())
    }
}

impl Patchable for Workflow {
    const KIND: &'static str = "workflows";

    /// All optional fields are cleared with `remove`. `definition` and
    /// `trigger` are compared by parsed structure and replaced whole.
    fn diff(old: &Self, new: &Self) -> Result<Patch, PatchError> {
        new.check_blobs()?;
        let mut b = PatchBuilder::new();
        b.required("name", &old.name, &new.name)?;
        b.optional("description", &old.description, &new.description, NullPolicy::Remove)?;
        b.optional("owner", &old.owner, &new.owner, NullPolicy::Remove)?;
        b.optional("enabled", &old.enabled, &new.enabled, NullPolicy::Remove)?;
        b.optional("definition", &old.definition, &new.definition, NullPolicy::Remove)?;
        b.optional("trigger", &old.trigger, &new.trigger, NullPolicy::Remove)?;
        Ok(b.build())
    }
}
