//! Core data types for Tree ACL.
//!
//! Subjects live in the ARO tree, protected resources in the ACO tree. Both
//! trees share the same node shape; a `PermissionRecord` binds one node of
//! each tree with four independent CRUD flags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a node in either tree.
pub type NodeId = i64;

/// Owner model name of role nodes in the ARO tree.
pub const ROLES_MODEL: &str = "Roles";

/// Owner model name of user nodes in the ARO tree.
pub const USERS_MODEL: &str = "Users";

/// Separator used when joining node aliases into a resource path.
pub const PATH_SEPARATOR: char = '/';

/// Selects one of the two trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeKind {
    /// Access Request Objects: users and roles.
    Aro,
    /// Access Control Objects: protected resources.
    Aco,
}

impl TreeKind {
    /// Returns the lowercase name of this tree.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aro => "aro",
            Self::Aco => "aco",
        }
    }
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the ARO or ACO tree.
///
/// # Example
///
/// ```rust
/// use tree_acl_core::TreeNode;
///
/// let pages = TreeNode::new(3, "Pages").parent(2);
/// assert_eq!(pages.parent_id, Some(2));
/// assert!(!pages.is_root());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Unique identifier within its tree.
    pub id: NodeId,

    /// Parent node, `None` for a root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,

    /// Path segment contributed by this node.
    pub alias: String,

    /// Owner model (e.g. `Roles`, `Users`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Owner record id within `model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<i64>,
}

impl TreeNode {
    /// Creates a root node with the given id and alias.
    pub fn new(id: NodeId, alias: impl Into<String>) -> Self {
        Self {
            id,
            parent_id: None,
            alias: alias.into(),
            model: None,
            foreign_key: None,
        }
    }

    /// Sets the parent node.
    pub fn parent(mut self, parent_id: NodeId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the owning model and foreign key.
    pub fn owner(mut self, model: impl Into<String>, foreign_key: i64) -> Self {
        self.model = Some(model.into());
        self.foreign_key = Some(foreign_key);
        self
    }

    /// Returns true if this node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns true if this node is owned by `(model, foreign_key)`.
    pub fn is_owned_by(&self, model: &str, foreign_key: i64) -> bool {
        self.model.as_deref() == Some(model) && self.foreign_key == Some(foreign_key)
    }
}

/// The four independent CRUD flags of a permission record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrudFlags {
    pub create: bool,
    pub read: bool,
    pub update: bool,
    pub delete: bool,
}

impl CrudFlags {
    /// All four flags set.
    pub fn all() -> Self {
        Self {
            create: true,
            read: true,
            update: true,
            delete: true,
        }
    }

    /// No flag set.
    pub fn none() -> Self {
        Self::default()
    }

    /// Only `read` set.
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    /// Returns true if every flag is set.
    pub fn is_full(&self) -> bool {
        self.create && self.read && self.update && self.delete
    }
}

/// Binds one ARO node to one ACO node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// Record identifier. `0` marks a record that has not been stored yet.
    #[serde(default)]
    pub id: i64,
    /// The subject node.
    pub aro_id: NodeId,
    /// The resource node.
    pub aco_id: NodeId,
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub delete: bool,
}

impl PermissionRecord {
    /// Creates an unsaved record with the given flags.
    pub fn new(aro_id: NodeId, aco_id: NodeId, flags: CrudFlags) -> Self {
        Self {
            id: 0,
            aro_id,
            aco_id,
            create: flags.create,
            read: flags.read,
            update: flags.update,
            delete: flags.delete,
        }
    }

    /// Sets the record identifier.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Returns the flags of this record.
    pub fn flags(&self) -> CrudFlags {
        CrudFlags {
            create: self.create,
            read: self.read,
            update: self.update,
            delete: self.delete,
        }
    }

    /// Replaces the flags of this record.
    pub fn set_flags(&mut self, flags: CrudFlags) {
        self.create = flags.create;
        self.read = flags.read;
        self.update = flags.update;
        self.delete = flags.delete;
    }

    /// Returns true if create, read, update and delete are all granted.
    pub fn is_full_grant(&self) -> bool {
        self.flags().is_full()
    }

    /// Returns true if this record has not been stored yet.
    pub fn is_new(&self) -> bool {
        self.id == 0
    }
}

/// Identifies a role or user node of the ARO tree by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleReference {
    pub model: String,
    pub foreign_key: i64,
}

impl RoleReference {
    /// Creates a reference to an arbitrary owner.
    pub fn new(model: impl Into<String>, foreign_key: i64) -> Self {
        Self {
            model: model.into(),
            foreign_key,
        }
    }

    /// References the node of a role.
    pub fn role(role_id: i64) -> Self {
        Self::new(ROLES_MODEL, role_id)
    }

    /// References the node of a user.
    pub fn user(user_id: i64) -> Self {
        Self::new(USERS_MODEL, user_id)
    }
}

impl fmt::Display for RoleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.model, self.foreign_key)
    }
}
