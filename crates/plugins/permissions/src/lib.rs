//! # Tree ACL Permissions
//!
//! Permission resolution over the ARO (subject) and ACO (resource) trees.
//! It provides:
//! - Allowed-action lists for roles and users, with multi-role expansion
//! - Permission matrices for administration screens
//! - Single-path checks with role inheritance
//! - Record writes with cache invalidation
//!
//! ```rust,ignore
//! let adapter = Arc::new(MemoryAdapter::new());
//! let acl = AclPermissions::builder()
//!     .tree_store(adapter.clone())
//!     .permission_store(adapter.clone())
//!     .membership(adapter)
//!     .cache(Arc::new(MemoryCache::new()))
//!     .settings(Arc::new(AclSettings::default().with_multi_role(true)))
//!     .build()?;
//!
//! let paths = acl.allowed_actions_by_user_id(7).await?;
//! ```

mod aggregator;
mod check;
mod invalidation;
mod matrix;
mod membership;
mod path;
mod types;
mod writer;

pub use aggregator::PermissionAggregator;
pub use check::PermissionChecker;
pub use invalidation::PermissionInvalidator;
pub use matrix::MatrixFormatter;
pub use membership::RoleMembershipResolver;
pub use path::{PathResolver, join_aliases, path_depth};
pub use types::*;
pub use writer::PermissionWriter;

use std::collections::BTreeMap;
use std::sync::Arc;
use tree_acl_core::config::AclSettings;
use tree_acl_core::error::{AclError, AclResult};
use tree_acl_core::traits::{
    CacheStore, MembershipProvider, PermissionStore, SettingsProvider, TreeStore,
};
use tree_acl_core::types::{CrudFlags, NodeId, PermissionRecord, RoleReference, TreeNode};

/// Entry point wiring every permission component to one set of ports.
#[derive(Clone)]
pub struct AclPermissions {
    aggregator: PermissionAggregator,
    checker: PermissionChecker,
    formatter: MatrixFormatter,
    invalidator: PermissionInvalidator,
    writer: PermissionWriter,
}

impl AclPermissions {
    /// Creates a builder.
    pub fn builder() -> AclPermissionsBuilder {
        AclPermissionsBuilder::new()
    }

    /// Resource paths fully granted to a role.
    pub async fn allowed_actions_by_role_id(&self, role_id: i64) -> AclResult<Vec<String>> {
        self.aggregator.allowed_actions_by_role_id(role_id).await
    }

    /// Resource paths fully granted to a user.
    pub async fn allowed_actions_by_user_id(&self, user_id: i64) -> AclResult<Vec<String>> {
        self.aggregator.allowed_actions_by_user_id(user_id).await
    }

    /// Builds the permission matrix for `acos` and the subjects in `aros`.
    pub async fn format(
        &self,
        acos: &[TreeNode],
        aros: &BTreeMap<i64, NodeId>,
        options: &FormatOptions,
    ) -> AclResult<PermissionMatrix> {
        self.formatter.format(acos, aros, options).await
    }

    /// Checks full CRUD access of `subject` to `path`.
    pub async fn check(&self, subject: &RoleReference, path: &str) -> AclResult<bool> {
        self.checker.check(subject, path).await
    }

    /// Invalidates cached results after a record was created or updated
    /// outside of this crate.
    pub async fn on_permission_persisted(&self) -> AclResult<()> {
        self.invalidator.on_permission_persisted().await
    }

    /// Invalidates cached results after a record was deleted outside of
    /// this crate.
    pub async fn on_permission_deleted(&self) -> AclResult<()> {
        self.invalidator.on_permission_deleted().await
    }

    /// Invalidates cached results after tree nodes or role memberships
    /// changed. Permission writes made through this crate evict on their
    /// own; structural changes never do.
    pub async fn on_structure_changed(&self) -> AclResult<()> {
        self.invalidator.on_structure_changed().await
    }

    /// Stores a record, see [`PermissionWriter::save`].
    pub async fn save(&self, record: &PermissionRecord) -> AclResult<PermissionRecord> {
        self.writer.save(record).await
    }

    /// Deletes a record by id.
    pub async fn delete(&self, id: i64) -> AclResult<()> {
        self.writer.delete(id).await
    }

    /// Sets the flags `subject` holds on `path`.
    pub async fn grant(
        &self,
        subject: &RoleReference,
        path: &str,
        flags: CrudFlags,
    ) -> AclResult<PermissionRecord> {
        self.writer.grant(subject, path, flags).await
    }

    /// Removes the record binding `subject` to `path`.
    pub async fn revoke(&self, subject: &RoleReference, path: &str) -> AclResult<bool> {
        self.writer.revoke(subject, path).await
    }
}

/// Builder for [`AclPermissions`].
pub struct AclPermissionsBuilder {
    trees: Option<Arc<dyn TreeStore>>,
    permissions: Option<Arc<dyn PermissionStore>>,
    membership: Option<Arc<dyn MembershipProvider>>,
    cache: Option<Arc<dyn CacheStore>>,
    settings: Arc<dyn SettingsProvider>,
}

impl AclPermissionsBuilder {
    pub fn new() -> Self {
        Self {
            trees: None,
            permissions: None,
            membership: None,
            cache: None,
            settings: Arc::new(AclSettings::default()),
        }
    }

    /// Sets the ARO/ACO tree storage. Required.
    pub fn tree_store(mut self, trees: Arc<dyn TreeStore>) -> Self {
        self.trees = Some(trees);
        self
    }

    /// Sets the permission record storage. Required.
    pub fn permission_store(mut self, permissions: Arc<dyn PermissionStore>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Sets the role membership lookup used in multi-role mode.
    pub fn membership(mut self, membership: Arc<dyn MembershipProvider>) -> Self {
        self.membership = Some(membership);
        self
    }

    /// Enables result caching.
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the settings source. Defaults to [`AclSettings::default`].
    pub fn settings(mut self, settings: Arc<dyn SettingsProvider>) -> Self {
        self.settings = settings;
        self
    }

    /// Wires the components.
    pub fn build(self) -> AclResult<AclPermissions> {
        let trees = self.trees.ok_or_else(|| AclError::MissingConfiguration {
            key: "tree_store".to_string(),
        })?;
        let permissions = self.permissions.ok_or_else(|| AclError::MissingConfiguration {
            key: "permission_store".to_string(),
        })?;

        let paths = PathResolver::new(trees.clone());
        let subjects =
            RoleMembershipResolver::new(trees.clone(), self.membership, self.settings.clone());
        let invalidator = PermissionInvalidator::new(self.cache.clone(), self.settings.clone());
        let checker = PermissionChecker::new(trees.clone(), permissions.clone(), paths.clone());

        Ok(AclPermissions {
            aggregator: PermissionAggregator::new(
                permissions.clone(),
                paths.clone(),
                subjects,
                self.cache,
                self.settings,
            ),
            formatter: MatrixFormatter::new(trees.clone(), paths.clone(), checker.clone()),
            writer: PermissionWriter::new(trees, permissions, paths, invalidator.clone()),
            checker,
            invalidator,
        })
    }
}

impl Default for AclPermissionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
