use std::collections::BTreeMap;

use json_patch::Patch;
use serde::{Deserialize, Serialize};

use super::Patchable;
use crate::{
    builder::{NullPolicy, PatchBuilder},
    error::PatchError,
    optionality::Optionality,
    value::AttributeValue,
};

/// A reusable attribute transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Optionality::is_absent")]
    pub attributes: Optionality<BTreeMap<String, AttributeValue>>,
}

impl Patchable for Transform {
    const KIND: &'static str = "transforms";

    /// `attributes` is replaced as a whole and cleared with `null`.
    fn diff(old: &Self, new: &Self) -> Result<Patch, PatchError> {
        let mut b = PatchBuilder::new();
        b.required("name", &old.name, &new.name)?;
        b.required("type", &old.type_, &new.type_)?;
        b.optional(
            "attributes",
            &old.attributes,
            &new.attributes,
            NullPolicy::ReplaceWithNull,
        )?;
        Ok(b.build())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::objects::testing::{assert_idempotent, assert_round_trip, patch_json};

    fn sample(length: i32) -> Transform {
        Transform {
            name: "Short username".to_string(),
            type_: "substring".to_string(),
            attributes: Optionality::Value(BTreeMap::from([
                ("begin".to_string(), AttributeValue::Int32(0)),
                ("end".to_string(), AttributeValue::Int32(length)),
                (
                    "input".to_string(),
                    AttributeValue::StringList(vec!["$username".to_string()]),
                ),
            ])),
        }
    }

    #[test]
    fn unchanged_transform_yields_no_operations() {
        assert_idempotent(&sample(8));
    }

    #[test]
    fn attribute_change_replaces_map() {
        let patch = patch_json(&sample(8), &sample(12));
        assert_eq!(
            patch,
            json!([{
                "op": "replace",
                "path": "/attributes",
                "value": { "begin": 0, "end": 12, "input": ["$username"] }
            }])
        );
        assert_round_trip(&sample(8), &sample(12));
    }

    #[test]
    fn attributes_cleared_with_null() {
        let old = sample(8);
        let mut new = sample(8);
        new.attributes = Optionality::Null;
        assert_eq!(
            patch_json(&old, &new),
            json!([{ "op": "replace", "path": "/attributes", "value": null }])
        );
    }

    #[test]
    fn parses_wire_form() {
        let t: Transform = serde_json::from_value(json!({
            "name": "Short username",
            "type": "substring",
            "attributes": { "begin": 0, "end": 8, "input": ["$username"] }
        }))
        .unwrap();
        assert_eq!(t, sample(8));
    }
}
