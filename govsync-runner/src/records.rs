//! Loading object records from JSON files.
//!
//! A record file holds one object in the API's wire form. The observed side
//! of a diff is taken as is. The desired side is validated, and its
//! server-computed fields are marked unknown so they are never written.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use govsync_patch::{
    compute_patch,
    objects::{AccessProfile, IdentityProfile, LifecycleState, Role, Transform, Workflow},
    Patch, Patchable,
};
use serde::de::DeserializeOwned;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    AccessProfile,
    Role,
    IdentityProfile,
    LifecycleState,
    Workflow,
    Transform,
}

impl Kind {
    /// The collection segment used in resource paths, e.g. `roles`.
    pub fn collection(&self) -> &'static str {
        match self {
            Kind::AccessProfile => AccessProfile::KIND,
            Kind::Role => Role::KIND,
            Kind::IdentityProfile => IdentityProfile::KIND,
            Kind::LifecycleState => LifecycleState::KIND,
            Kind::Workflow => Workflow::KIND,
            Kind::Transform => Transform::KIND,
        }
    }

    /// The resource path of the object with `id`. Lifecycle states live
    /// under their identity profile and have no path of their own.
    pub fn object_path(&self, id: &str) -> Option<String> {
        match self {
            Kind::LifecycleState => None,
            _ => Some(format!("v3/{}/{}", self.collection(), id)),
        }
    }
}

pub fn load_observed<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read record file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Could not parse record file {}", path.display()))
}

pub fn load_desired<T: Patchable + DeserializeOwned>(path: &Path) -> Result<T> {
    let mut record: T = load_observed(path)?;
    record
        .validate()
        .with_context(|| format!("Invalid {} record in {}", T::KIND, path.display()))?;
    record.mark_server_computed_unknown();
    Ok(record)
}

fn diff_as<T: Patchable + DeserializeOwned>(old: &Path, new: &Path) -> Result<Patch> {
    let observed: T = load_observed(old)?;
    let desired: T = load_desired(new)?;
    let patch = compute_patch(&observed, &desired).with_context(|| {
        format!(
            "Could not compute patch from {} to {}",
            old.display(),
            new.display()
        )
    })?;
    debug!(kind = T::KIND, operations = patch.0.len(), "Computed patch");
    Ok(patch)
}

/// The patch that turns the object recorded in `old` into the one in `new`.
pub fn diff_files(kind: Kind, old: &Path, new: &Path) -> Result<Patch> {
    match kind {
        Kind::AccessProfile => diff_as::<AccessProfile>(old, new),
        Kind::Role => diff_as::<Role>(old, new),
        Kind::IdentityProfile => diff_as::<IdentityProfile>(old, new),
        Kind::LifecycleState => diff_as::<LifecycleState>(old, new),
        Kind::Workflow => diff_as::<Workflow>(old, new),
        Kind::Transform => diff_as::<Transform>(old, new),
    }
}
