//! # Tree ACL Core
//!
//! This crate provides the foundational types and ports for Tree ACL.
//! It defines the tree and permission data structures, the error type, the
//! settings loader, and the trait interfaces that storage adapters, role
//! membership lookups and caches must implement.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::{AclSettings, CacheSettings};
pub use error::{AclError, AclResult};
pub use traits::{
    CacheStore, MembershipProvider, PERMISSIONS_CACHE_GROUP, PermissionStore, SettingsProvider,
    TreeStore,
};
pub use types::{
    CrudFlags, NodeId, PATH_SEPARATOR, PermissionRecord, ROLES_MODEL, RoleReference, TreeKind,
    TreeNode, USERS_MODEL,
};
