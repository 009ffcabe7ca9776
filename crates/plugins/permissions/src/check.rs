//! Single-path permission checks with ARO inheritance.

use std::sync::Arc;
use tree_acl_core::error::AclResult;
use tree_acl_core::traits::{PermissionStore, TreeStore};
use tree_acl_core::types::{RoleReference, TreeKind};

use crate::path::PathResolver;

/// Answers "may this subject fully access this path".
#[derive(Clone)]
pub struct PermissionChecker {
    trees: Arc<dyn TreeStore>,
    permissions: Arc<dyn PermissionStore>,
    paths: PathResolver,
}

impl PermissionChecker {
    pub fn new(
        trees: Arc<dyn TreeStore>,
        permissions: Arc<dyn PermissionStore>,
        paths: PathResolver,
    ) -> Self {
        Self {
            trees,
            permissions,
            paths,
        }
    }

    /// Checks full CRUD access of `subject` to the resource at `path`.
    ///
    /// Subject nodes are tried nearest first. For each one the resource chain
    /// is scanned from the leaf upwards and the first record found decides.
    /// A subject without any record on the chain defers to its parent.
    pub async fn check(&self, subject: &RoleReference, path: &str) -> AclResult<bool> {
        let Some(aro) = self
            .trees
            .find_node_by_owner(TreeKind::Aro, &subject.model, subject.foreign_key)
            .await?
        else {
            tracing::debug!(subject = %subject, "Subject has no ARO node");
            return Ok(false);
        };

        let Some(aco) = self.paths.find_by_path(TreeKind::Aco, path).await? else {
            tracing::debug!(path, "Path does not resolve to an ACO node");
            return Ok(false);
        };

        let mut aro_chain = self.trees.ancestor_path(TreeKind::Aro, aro.id).await?;
        aro_chain.reverse();
        let mut aco_chain = self.trees.ancestor_path(TreeKind::Aco, aco.id).await?;
        aco_chain.reverse();

        for aro_node in &aro_chain {
            for aco_node in &aco_chain {
                if let Some(record) = self
                    .permissions
                    .find_permission(aro_node.id, aco_node.id)
                    .await?
                {
                    let allowed = record.is_full_grant();
                    tracing::debug!(
                        subject = %subject,
                        path,
                        aro_id = aro_node.id,
                        aco_id = aco_node.id,
                        allowed,
                        "Permission record decided check"
                    );
                    return Ok(allowed);
                }
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_acl_adapter_memory::MemoryAdapter;
    use tree_acl_core::types::{CrudFlags, PermissionRecord, ROLES_MODEL, TreeNode, USERS_MODEL};

    async fn checker() -> (PermissionChecker, Arc<MemoryAdapter>) {
        let adapter = Arc::new(MemoryAdapter::new());
        for node in [
            TreeNode::new(1, "Role-admin").owner(ROLES_MODEL, 1),
            TreeNode::new(2, "Role-editor").parent(1).owner(ROLES_MODEL, 2),
            TreeNode::new(10, "User-5").parent(2).owner(USERS_MODEL, 5),
        ] {
            adapter.save_node(TreeKind::Aro, &node).await.unwrap();
        }
        for node in [
            TreeNode::new(1, "Controllers"),
            TreeNode::new(2, "Pages").parent(1),
            TreeNode::new(3, "index").parent(2),
            TreeNode::new(4, "delete").parent(2),
        ] {
            adapter.save_node(TreeKind::Aco, &node).await.unwrap();
        }

        let checker = PermissionChecker::new(
            adapter.clone(),
            adapter.clone(),
            PathResolver::new(adapter.clone()),
        );
        (checker, adapter)
    }

    async fn record(adapter: &MemoryAdapter, aro_id: i64, aco_id: i64, flags: CrudFlags) {
        adapter
            .create_permission(&PermissionRecord::new(aro_id, aco_id, flags))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_grant_on_ancestor_resource_applies() {
        let (checker, adapter) = checker().await;
        record(&adapter, 2, 2, CrudFlags::all()).await;

        let editor = RoleReference::role(2);
        assert!(checker.check(&editor, "Controllers/Pages/index").await.unwrap());
        assert!(checker.check(&editor, "Controllers/Pages").await.unwrap());
        assert!(!checker.check(&editor, "Controllers").await.unwrap());
    }

    #[tokio::test]
    async fn test_subject_inherits_role_grants() {
        let (checker, adapter) = checker().await;
        record(&adapter, 1, 1, CrudFlags::all()).await;

        let user = RoleReference::user(5);
        assert!(checker.check(&user, "Controllers/Pages/delete").await.unwrap());
    }

    #[tokio::test]
    async fn test_nearer_partial_record_denies() {
        let (checker, adapter) = checker().await;
        record(&adapter, 2, 1, CrudFlags::all()).await;
        record(&adapter, 2, 4, CrudFlags::read_only()).await;

        let editor = RoleReference::role(2);
        assert!(checker.check(&editor, "Controllers/Pages/index").await.unwrap());
        assert!(!checker.check(&editor, "Controllers/Pages/delete").await.unwrap());
    }

    #[tokio::test]
    async fn test_nearer_subject_record_wins() {
        let (checker, adapter) = checker().await;
        record(&adapter, 1, 3, CrudFlags::all()).await;
        record(&adapter, 10, 1, CrudFlags::none()).await;

        // The user's own deny on the root shadows the admin role's grant.
        let user = RoleReference::user(5);
        assert!(!checker.check(&user, "Controllers/Pages/index").await.unwrap());
        assert!(checker.check(&RoleReference::role(1), "Controllers/Pages/index").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_subject_or_path_is_denied() {
        let (checker, adapter) = checker().await;
        record(&adapter, 1, 1, CrudFlags::all()).await;

        assert!(!checker.check(&RoleReference::role(9), "Controllers").await.unwrap());
        assert!(!checker.check(&RoleReference::role(1), "Controllers/Users").await.unwrap());
        assert!(!checker.check(&RoleReference::role(1), "").await.unwrap());
    }
}
