//! Compiles the difference between the last-observed and the desired state
//! of an identity-governance object into an RFC 6902 JSON Patch.
//!
//! The compiler is a pure function: it performs no I/O and keeps no state,
//! so it can be called concurrently from any number of tasks.
//!
//! ```
//! use govsync_patch::{compute_patch, objects::AccessProfile, Optionality};
//!
//! let old = AccessProfile::new("Developers");
//! let mut new = old.clone();
//! new.description = Optionality::Value("Developer tooling".to_string());
//!
//! let patch = compute_patch(&old, &new).unwrap();
//! assert_eq!(
//!     serde_json::to_value(&patch).unwrap(),
//!     serde_json::json!([{ "op": "add", "path": "/description", "value": "Developer tooling" }])
//! );
//! ```

pub mod builder;
pub mod criteria;
pub mod error;
pub mod objects;
pub mod optionality;
pub mod value;

pub use builder::{NullPolicy, PatchBuilder};
pub use error::PatchError;
pub use json_patch::Patch;
pub use objects::Patchable;
pub use optionality::Optionality;
pub use value::{AttributeValue, JsonBlob, Reference};

/// Compute the operations that turn the remote object matching `old` into
/// one matching `new`.
pub fn compute_patch<T: Patchable>(old: &T, new: &T) -> Result<Patch, PatchError> {
    T::diff(old, new)
}
