//! Permission matrix types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tree_acl_core::types::{NodeId, ROLES_MODEL};

/// Options for [`MatrixFormatter::format`](crate::MatrixFormatter::format).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Owner model of the ARO references.
    pub model: String,
    /// Include the per-subject grant map.
    pub include_perms: bool,
    /// Foreign key that is granted everything without a check.
    pub superadmin_key: Option<i64>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            model: ROLES_MODEL.to_string(),
            include_perms: true,
            superadmin_key: Some(1),
        }
    }
}

impl FormatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the owner model of the ARO references.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets whether grants are computed.
    pub fn include_perms(mut self, include: bool) -> Self {
        self.include_perms = include;
        self
    }

    /// Sets or clears the superadmin foreign key.
    pub fn superadmin_key(mut self, key: Option<i64>) -> Self {
        self.superadmin_key = key;
        self
    }
}

/// One row of the permission matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
    /// Alias of the resource node.
    pub alias: String,
    /// Number of descendants of the resource node.
    pub children: usize,
    /// Number of separators in the resource path.
    pub depth: usize,
    /// Foreign key -> `1` granted, `0` denied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<BTreeMap<i64, u8>>,
}

/// Resource node id -> matrix row.
pub type PermissionMatrix = BTreeMap<NodeId, MatrixEntry>;
