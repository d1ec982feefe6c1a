use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The state of an optional field on a record.
///
/// `Unset` and `Null` are distinct: a member that is missing from the remote
/// object is not the same as a member that is explicitly `null`. `Unknown` is
/// a value the caller has not resolved yet (typically a server-computed field
/// before the first read); the compiler never emits an operation for it.
///
/// Use with `#[serde(default, skip_serializing_if = "Optionality::is_absent")]`
/// so that a missing member reads as `Unset` and is not written back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Optionality<T> {
    Unknown,
    #[default]
    Unset,
    Null,
    Value(T),
}

impl<T> Optionality<T> {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Optionality::Unknown)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Optionality::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Optionality::Null)
    }

    /// Whether the field has no member on the wire, i.e. it is unset or not
    /// yet known.
    pub fn is_absent(&self) -> bool {
        matches!(self, Optionality::Unset | Optionality::Unknown)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Optionality::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Optionality<&T> {
        match self {
            Optionality::Unknown => Optionality::Unknown,
            Optionality::Unset => Optionality::Unset,
            Optionality::Null => Optionality::Null,
            Optionality::Value(v) => Optionality::Value(v),
        }
    }
}

impl<T> From<Option<T>> for Optionality<T> {
    /// `None` maps to `Null`, because an `Option` that is present on a record
    /// and empty is an explicit null.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Optionality::Value(v),
            None => Optionality::Null,
        }
    }
}

impl<T: Serialize> Serialize for Optionality<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Optionality::Value(v) => v.serialize(serializer),
            // Unset and Unknown are normally skipped by the containing struct.
            _ => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Optionality<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Optionality::from)
    }
}
