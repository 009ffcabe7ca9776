//! Permission record writes.
//!
//! Every successful write is followed by cache invalidation. A write whose
//! invalidation fails returns the cache error even though the record itself
//! was stored.

use std::sync::Arc;
use tree_acl_core::error::{AclError, AclResult};
use tree_acl_core::traits::{PermissionStore, TreeStore};
use tree_acl_core::types::{CrudFlags, NodeId, PermissionRecord, RoleReference, TreeKind};

use crate::invalidation::PermissionInvalidator;
use crate::path::PathResolver;

/// Creates, updates and deletes permission records.
#[derive(Clone)]
pub struct PermissionWriter {
    trees: Arc<dyn TreeStore>,
    permissions: Arc<dyn PermissionStore>,
    paths: PathResolver,
    invalidator: PermissionInvalidator,
}

impl PermissionWriter {
    pub fn new(
        trees: Arc<dyn TreeStore>,
        permissions: Arc<dyn PermissionStore>,
        paths: PathResolver,
        invalidator: PermissionInvalidator,
    ) -> Self {
        Self {
            trees,
            permissions,
            paths,
            invalidator,
        }
    }

    /// Stores a record.
    ///
    /// At most one record exists per (ARO, ACO) pair: saving a new record for
    /// a pair that already has one updates the existing record instead.
    pub async fn save(&self, record: &PermissionRecord) -> AclResult<PermissionRecord> {
        let existing = self
            .permissions
            .find_permission(record.aro_id, record.aco_id)
            .await?;

        let stored = match existing {
            Some(existing) if record.is_new() || existing.id == record.id => {
                let mut updated = existing;
                updated.set_flags(record.flags());
                self.permissions.update_permission(&updated).await?
            }
            Some(existing) => {
                return Err(AclError::duplicate(
                    "permission",
                    "aro_id,aco_id",
                    format!("{},{} (record {})", record.aro_id, record.aco_id, existing.id),
                ));
            }
            None if record.is_new() => self.permissions.create_permission(record).await?,
            None => self.permissions.update_permission(record).await?,
        };

        tracing::debug!(
            permission_id = stored.id,
            aro_id = stored.aro_id,
            aco_id = stored.aco_id,
            full = stored.is_full_grant(),
            "Saved permission"
        );
        self.invalidator.on_permission_persisted().await?;
        Ok(stored)
    }

    /// Deletes a record by id.
    pub async fn delete(&self, id: i64) -> AclResult<()> {
        self.permissions.delete_permission(id).await?;
        tracing::debug!(permission_id = id, "Deleted permission");
        self.invalidator.on_permission_deleted().await
    }

    /// Sets the flags `subject` holds on the resource at `path`.
    pub async fn grant(
        &self,
        subject: &RoleReference,
        path: &str,
        flags: CrudFlags,
    ) -> AclResult<PermissionRecord> {
        let (aro_id, aco_id) = self.resolve_pair(subject, path).await?;
        self.save(&PermissionRecord::new(aro_id, aco_id, flags)).await
    }

    /// Removes the record binding `subject` to the resource at `path`.
    ///
    /// Returns false when there was nothing to remove.
    pub async fn revoke(&self, subject: &RoleReference, path: &str) -> AclResult<bool> {
        let (aro_id, aco_id) = self.resolve_pair(subject, path).await?;
        match self.permissions.find_permission(aro_id, aco_id).await? {
            Some(record) => {
                self.delete(record.id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn resolve_pair(
        &self,
        subject: &RoleReference,
        path: &str,
    ) -> AclResult<(NodeId, NodeId)> {
        let aro = self
            .trees
            .find_node_by_owner(TreeKind::Aro, &subject.model, subject.foreign_key)
            .await?
            .ok_or_else(|| AclError::not_found("aro", "owner", subject))?;
        let aco = self
            .paths
            .find_by_path(TreeKind::Aco, path)
            .await?
            .ok_or_else(|| AclError::not_found("aco", "path", path))?;
        Ok((aro.id, aco.id))
    }
}
