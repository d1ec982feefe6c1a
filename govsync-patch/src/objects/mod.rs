//! The patchable object types.
//!
//! Each type lists its fields in emission order, and documents the null
//! policy of every optional field and any coupling between fields that the
//! remote API requires within one request.

use json_patch::Patch;

use crate::error::PatchError;

pub mod access_profile;
pub mod identity_profile;
pub mod lifecycle_state;
pub mod role;
pub mod transform;
pub mod workflow;

pub use access_profile::AccessProfile;
pub use identity_profile::IdentityProfile;
pub use lifecycle_state::LifecycleState;
pub use role::Role;
pub use transform::Transform;
pub use workflow::Workflow;

/// An object type whose desired state can be compiled into a JSON Patch.
pub trait Patchable {
    /// The name of the object type, as used in resource paths and on the
    /// command line.
    const KIND: &'static str;

    /// Operations that turn the remote object matching `old` into one matching
    /// `new`. Must return an empty patch when `old == new`.
    fn diff(old: &Self, new: &Self) -> Result<Patch, PatchError>;

    /// Mark the fields the server computes as not yet known, so that a
    /// desired record never tries to overwrite them.
    fn mark_server_computed_unknown(&mut self) {}

    /// Check constraints the remote API enforces on the desired record.
    fn validate(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use serde::Serialize;
    use serde_json::Value;

    use super::Patchable;

    /// The remote API does not distinguish a `null` member from a missing one
    /// when reading an object back.
    pub(crate) fn strip_nulls(value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k, strip_nulls(v)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
            other => other,
        }
    }

    /// Apply the computed patch to a store seeded with `old` and check that
    /// the result reads back as `new`.
    pub(crate) fn assert_round_trip<T: Patchable + Serialize>(old: &T, new: &T) {
        let mut store = serde_json::to_value(old).unwrap();
        let patch = T::diff(old, new).unwrap();
        json_patch::patch(&mut store, &patch.0).unwrap_or_else(|e| {
            panic!(
                "patch {} does not apply: {}",
                serde_json::to_string(&patch).unwrap(),
                e
            )
        });
        assert_eq!(
            strip_nulls(store),
            strip_nulls(serde_json::to_value(new).unwrap())
        );
    }

    pub(crate) fn assert_idempotent<T: Patchable>(x: &T) {
        let patch = T::diff(x, x).unwrap();
        assert!(patch.0.is_empty(), "expected no operations, got {:?}", patch);
    }

    pub(crate) fn patch_json<T: Patchable>(old: &T, new: &T) -> Value {
        serde_json::to_value(T::diff(old, new).unwrap()).unwrap()
    }
}
