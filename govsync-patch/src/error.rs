use std::fmt::Display;

use thiserror::Error;

/// Errors produced while computing a patch.
///
/// These are always caller configuration errors and are never worth retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// A field that holds structured sub-data could not be parsed.
    #[error("malformed data in field {path}: {reason}")]
    MalformedFieldData { path: String, reason: String },
}

impl PatchError {
    pub fn malformed(path: &str, reason: impl Display) -> Self {
        PatchError::MalformedFieldData {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The JSON Pointer of the field the error is about.
    pub fn path(&self) -> &str {
        match self {
            PatchError::MalformedFieldData { path, .. } => path,
        }
    }
}
