//! Membership criteria: a small boolean expression tree.
//!
//! A criteria tree is at most [`MAX_DEPTH`] levels deep. Inner nodes carry
//! `AND`/`OR` and children; leaves carry a comparison, a key and a value.
//! The compiler never patches inside a tree: a change anywhere replaces the
//! field that holds it.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::value::Reference;

/// Root node = level 1.
pub const MAX_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriteriaOperation {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    And,
    Or,
}

impl CriteriaOperation {
    pub fn is_logical(&self) -> bool {
        matches!(self, CriteriaOperation::And | CriteriaOperation::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriteriaKeyType {
    Identity,
    Account,
    Entitlement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaKey {
    #[serde(rename = "type")]
    pub type_: CriteriaKeyType,
    pub property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaNode {
    pub operation: CriteriaOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<CriteriaKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<CriteriaNode>>,
}

impl CriteriaNode {
    pub fn leaf(operation: CriteriaOperation, key: CriteriaKey, value: &str) -> Self {
        CriteriaNode {
            operation,
            key: Some(key),
            string_value: Some(value.to_string()),
            children: None,
        }
    }

    pub fn branch(operation: CriteriaOperation, children: Vec<CriteriaNode>) -> Self {
        CriteriaNode {
            operation,
            key: None,
            string_value: None,
            children: Some(children),
        }
    }

    /// Number of levels in the tree, counting this node.
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(CriteriaNode::depth)
            .max()
            .unwrap_or(0)
    }

    /// Check the shape constraints the remote API enforces.
    pub fn validate(&self) -> Result<()> {
        let depth = self.depth();
        if depth > MAX_DEPTH {
            bail!(
                "criteria tree is {} levels deep, at most {} are allowed",
                depth,
                MAX_DEPTH
            );
        }
        self.validate_node()
    }

    fn validate_node(&self) -> Result<()> {
        let has_children = self.children.as_ref().is_some_and(|c| !c.is_empty());
        if self.operation.is_logical() {
            if !has_children {
                bail!("{:?} criteria node requires children", self.operation);
            }
        } else {
            if has_children {
                bail!("{:?} criteria node must not have children", self.operation);
            }
            if self.key.is_none() {
                bail!("{:?} criteria node requires a key", self.operation);
            }
        }
        for child in self.children.iter().flatten() {
            child.validate_node()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipType {
    Standard,
    IdentityList,
}

/// How identities become members of a role: by criteria or by explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleMembership {
    #[serde(rename = "type")]
    pub type_: MembershipType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<CriteriaNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identities: Option<Vec<Reference>>,
}

impl RoleMembership {
    pub fn validate(&self) -> Result<()> {
        match (self.type_, &self.criteria) {
            (MembershipType::Standard, Some(criteria)) => criteria.validate(),
            (MembershipType::Standard, None) => bail!("STANDARD membership requires criteria"),
            (MembershipType::IdentityList, Some(_)) => {
                bail!("IDENTITY_LIST membership must not have criteria")
            }
            (MembershipType::IdentityList, None) => Ok(()),
        }
    }
}
