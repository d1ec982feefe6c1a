//! The per-field diff algorithm.
//!
//! Every field is compared on its own, and the resulting operations are
//! appended in the order the object type calls the builder. Paths are always
//! a single member name below the root; lists, references and nested objects
//! are replaced whole.

use json_patch::{
    jsonptr::PointerBuf, AddOperation, Patch, PatchOperation, RemoveOperation, ReplaceOperation,
};
use serde::Serialize;
use serde_json::Value;

use crate::{error::PatchError, optionality::Optionality};

/// How a field is cleared on the remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPolicy {
    /// Clearing emits `remove`.
    Remove,
    /// The API does not accept `remove` on this field; clearing emits
    /// `replace` with `null`, and an explicit null is written with `add`.
    ReplaceWithNull,
}

/// The outcome of comparing one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange<'a, T> {
    Unchanged,
    Add(&'a T),
    AddNull,
    Replace(&'a T),
    ReplaceNull,
    Remove,
}

impl<'a, T> FieldChange<'a, T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, FieldChange::Unchanged)
    }
}

/// Compare the old and new state of an optional field.
pub fn classify<'a, T: PartialEq>(
    old: &Optionality<T>,
    new: &'a Optionality<T>,
    policy: NullPolicy,
) -> FieldChange<'a, T> {
    if new.is_unknown() || old == new {
        return FieldChange::Unchanged;
    }
    match (old, new) {
        (Optionality::Value(_), Optionality::Value(v)) => FieldChange::Replace(v),
        // `add` on an existing member overwrites it, so it is also correct
        // when the old value was never resolved.
        (_, Optionality::Value(v)) => FieldChange::Add(v),
        (Optionality::Value(_), _) => match policy {
            NullPolicy::Remove => FieldChange::Remove,
            NullPolicy::ReplaceWithNull => FieldChange::ReplaceNull,
        },
        (Optionality::Unset | Optionality::Unknown, Optionality::Null)
            if policy == NullPolicy::ReplaceWithNull =>
        {
            FieldChange::AddNull
        }
        // Neither side holds a value the remote would store.
        _ => FieldChange::Unchanged,
    }
}

/// Accumulates the operations for one object.
#[derive(Debug, Default)]
pub struct PatchBuilder {
    ops: Vec<PatchOperation>,
}

impl PatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A field that is always present. Emits `replace` when it changed.
    pub fn required<T: PartialEq + Serialize>(
        &mut self,
        field: &str,
        old: &T,
        new: &T,
    ) -> Result<bool, PatchError> {
        if old == new {
            return Ok(false);
        }
        let value = to_json(field, new)?;
        self.replace(field, value);
        Ok(true)
    }

    /// An optional field, reference, list or nested object.
    ///
    /// Returns whether an operation was emitted.
    pub fn optional<T: PartialEq + Serialize>(
        &mut self,
        field: &str,
        old: &Optionality<T>,
        new: &Optionality<T>,
        policy: NullPolicy,
    ) -> Result<bool, PatchError> {
        let change = classify(old, new, policy);
        self.apply_change(field, change)
    }

    /// Like [`PatchBuilder::optional`], but when the field is unchanged and
    /// holds a value on both sides it is replaced anyway.
    ///
    /// Used for fields the API validates against another field in the same
    /// request.
    pub fn coupled<T: PartialEq + Serialize>(
        &mut self,
        field: &str,
        old: &Optionality<T>,
        new: &Optionality<T>,
        policy: NullPolicy,
    ) -> Result<bool, PatchError> {
        let change = match (classify(old, new, policy), old, new) {
            (FieldChange::Unchanged, Optionality::Value(_), Optionality::Value(v)) => {
                FieldChange::Replace(v)
            }
            (change, _, _) => change,
        };
        self.apply_change(field, change)
    }

    fn apply_change<T: Serialize>(
        &mut self,
        field: &str,
        change: FieldChange<'_, T>,
    ) -> Result<bool, PatchError> {
        match change {
            FieldChange::Unchanged => return Ok(false),
            FieldChange::Add(v) => {
                let value = to_json(field, v)?;
                self.add(field, value)
            }
            FieldChange::AddNull => self.add(field, Value::Null),
            FieldChange::Replace(v) => {
                let value = to_json(field, v)?;
                self.replace(field, value)
            }
            FieldChange::ReplaceNull => self.replace(field, Value::Null),
            FieldChange::Remove => self.remove(field),
        }
        Ok(true)
    }

    fn add(&mut self, field: &str, value: Value) {
        self.ops.push(PatchOperation::Add(AddOperation {
            path: pointer(field),
            value,
        }));
    }

    fn replace(&mut self, field: &str, value: Value) {
        self.ops.push(PatchOperation::Replace(ReplaceOperation {
            path: pointer(field),
            value,
        }));
    }

    fn remove(&mut self, field: &str) {
        self.ops.push(PatchOperation::Remove(RemoveOperation {
            path: pointer(field),
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn build(self) -> Patch {
        Patch(self.ops)
    }
}

fn pointer(field: &str) -> PointerBuf {
    PointerBuf::from_tokens([field])
}

fn to_json<T: Serialize>(field: &str, value: &T) -> Result<Value, PatchError> {
    serde_json::to_value(value)
        .map_err(|e| PatchError::malformed(&pointer(field).to_string(), e))
}
