//! Core traits for Tree ACL.
//!
//! These are the ports the permission core consumes. Adapters implement
//! them against a concrete backend; the memory adapter implements all of
//! them for tests and fixtures.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};

use crate::error::{AclError, AclResult};
use crate::types::{NodeId, PermissionRecord, TreeKind, TreeNode};

/// Default name of the cache group holding permission results.
pub const PERMISSIONS_CACHE_GROUP: &str = "permissions";

/// Storage for the ARO and ACO trees.
#[async_trait]
pub trait TreeStore: Send + Sync {
    // ==================== Node Lookups ====================

    /// Gets a node by ID.
    async fn get_node(&self, tree: TreeKind, id: NodeId) -> AclResult<Option<TreeNode>>;

    /// Gets the direct children of a node, or the roots when `parent_id` is `None`.
    async fn children(&self, tree: TreeKind, parent_id: Option<NodeId>)
    -> AclResult<Vec<TreeNode>>;

    /// Finds the node owned by `(model, foreign_key)`.
    async fn find_node_by_owner(
        &self,
        tree: TreeKind,
        model: &str,
        foreign_key: i64,
    ) -> AclResult<Option<TreeNode>>;

    // ==================== Structural Administration ====================

    /// Creates or replaces a node.
    async fn save_node(&self, tree: TreeKind, node: &TreeNode) -> AclResult<TreeNode>;

    /// Deletes a node. Implementations decide what happens to its children.
    async fn delete_node(&self, tree: TreeKind, id: NodeId) -> AclResult<()>;

    // ==================== Traversal ====================

    /// Returns the nodes from the root down to `id`, ancestors first and the
    /// node itself last. Returns an empty vector when `id` does not exist.
    ///
    /// The default implementation walks parent links through `get_node`;
    /// adapters backed by nested sets or recursive queries can override it.
    async fn ancestor_path(&self, tree: TreeKind, id: NodeId) -> AclResult<Vec<TreeNode>> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);

        while let Some(node_id) = current {
            if !seen.insert(node_id) {
                return Err(AclError::TreeCycle {
                    tree: tree.to_string(),
                    node_id,
                });
            }

            match self.get_node(tree, node_id).await? {
                Some(node) => {
                    current = node.parent_id;
                    path.push(node);
                }
                None if path.is_empty() => return Ok(Vec::new()),
                None => {
                    let child = path.last().map(|n: &TreeNode| n.id).unwrap_or(node_id);
                    return Err(AclError::invalid_node(
                        tree,
                        child,
                        format!("parent {node_id} does not exist"),
                    ));
                }
            }
        }

        path.reverse();
        Ok(path)
    }

    /// Counts the children of `id`; with `recursive` all descendants.
    async fn child_count(&self, tree: TreeKind, id: NodeId, recursive: bool) -> AclResult<usize> {
        if !recursive {
            return Ok(self.children(tree, Some(id)).await?.len());
        }

        let mut count = 0;
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);

        while let Some(parent) = queue.pop_front() {
            for child in self.children(tree, Some(parent)).await? {
                if !seen.insert(child.id) {
                    return Err(AclError::TreeCycle {
                        tree: tree.to_string(),
                        node_id: child.id,
                    });
                }
                count += 1;
                queue.push_back(child.id);
            }
        }

        Ok(count)
    }
}

/// Storage for permission records.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Gets a record by ID.
    async fn get_permission(&self, id: i64) -> AclResult<Option<PermissionRecord>>;

    /// Gets the record binding `aro_id` to `aco_id`, if any.
    async fn find_permission(
        &self,
        aro_id: NodeId,
        aco_id: NodeId,
    ) -> AclResult<Option<PermissionRecord>>;

    /// Gets every record whose subject is one of `aro_ids`, ordered by record id.
    async fn find_by_aros(&self, aro_ids: &[NodeId]) -> AclResult<Vec<PermissionRecord>>;

    /// Gets the records of `aro_ids` granting create, read, update and delete,
    /// ordered by record id.
    async fn find_full_grants(&self, aro_ids: &[NodeId]) -> AclResult<Vec<PermissionRecord>> {
        let records = self.find_by_aros(aro_ids).await?;
        Ok(records.into_iter().filter(|r| r.is_full_grant()).collect())
    }

    /// Stores a new record. Records with id `0` get the next free id.
    async fn create_permission(&self, record: &PermissionRecord) -> AclResult<PermissionRecord>;

    /// Replaces an existing record.
    async fn update_permission(&self, record: &PermissionRecord) -> AclResult<PermissionRecord>;

    /// Deletes a record by ID.
    async fn delete_permission(&self, id: i64) -> AclResult<()>;
}

/// Looks up the role nodes a user belongs to.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    /// Returns the ARO ids of every role held by `user_id`.
    async fn roles_for_user(&self, user_id: i64) -> AclResult<Vec<NodeId>>;
}

/// Read-only view of the settings the permission core depends on.
pub trait SettingsProvider: Send + Sync {
    /// Whether users inherit permissions from all the roles they hold.
    fn multi_role_enabled(&self) -> bool;

    /// Whether aggregated results are cached.
    fn cache_enabled(&self) -> bool {
        true
    }

    /// The cache group holding permission results.
    fn cache_group(&self) -> &str {
        PERMISSIONS_CACHE_GROUP
    }
}

/// Grouped key/value cache.
///
/// Evicting a group must be atomic: once `evict_group` returns, no later
/// `get` may observe a value stored in that group before the eviction.
///
/// Every eviction advances the group's generation. A result computed from
/// storage is written with [`set_if_generation`](Self::set_if_generation)
/// using the generation read before the computation started, so a result
/// that raced with an eviction is dropped instead of cached.
///
/// Only permission writes evict on their own. Callers that rename, move or
/// delete tree nodes, or change role memberships, evict the group through
/// the permission crate's structure hook.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Reads a cached value.
    async fn get(&self, group: &str, key: &str) -> AclResult<Option<serde_json::Value>>;

    /// Stores a value unconditionally.
    async fn set(&self, group: &str, key: &str, value: serde_json::Value) -> AclResult<()>;

    /// Returns the current generation of `group`; `0` before any eviction.
    async fn group_generation(&self, group: &str) -> AclResult<u64>;

    /// Stores a value only if `group` is still at `generation`.
    ///
    /// Returns false when the group was evicted in the meantime and the
    /// value was discarded.
    async fn set_if_generation(
        &self,
        group: &str,
        key: &str,
        value: serde_json::Value,
        generation: u64,
    ) -> AclResult<bool>;

    /// Drops every value stored in `group`.
    async fn evict_group(&self, group: &str) -> AclResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Minimal tree store exercising the default traversal methods.
    struct MapTree(HashMap<NodeId, TreeNode>);

    #[async_trait]
    impl TreeStore for MapTree {
        async fn get_node(&self, _tree: TreeKind, id: NodeId) -> AclResult<Option<TreeNode>> {
            Ok(self.0.get(&id).cloned())
        }

        async fn children(
            &self,
            _tree: TreeKind,
            parent_id: Option<NodeId>,
        ) -> AclResult<Vec<TreeNode>> {
            let mut nodes: Vec<TreeNode> = self
                .0
                .values()
                .filter(|n| n.parent_id == parent_id)
                .cloned()
                .collect();
            nodes.sort_by_key(|n| n.id);
            Ok(nodes)
        }

        async fn find_node_by_owner(
            &self,
            _tree: TreeKind,
            model: &str,
            foreign_key: i64,
        ) -> AclResult<Option<TreeNode>> {
            Ok(self
                .0
                .values()
                .find(|n| n.is_owned_by(model, foreign_key))
                .cloned())
        }

        async fn save_node(&self, _tree: TreeKind, node: &TreeNode) -> AclResult<TreeNode> {
            Ok(node.clone())
        }

        async fn delete_node(&self, _tree: TreeKind, _id: NodeId) -> AclResult<()> {
            Ok(())
        }
    }

    fn tree(nodes: Vec<TreeNode>) -> MapTree {
        MapTree(nodes.into_iter().map(|n| (n.id, n)).collect())
    }

    #[tokio::test]
    async fn test_ancestor_path_is_root_first() {
        let store = tree(vec![
            TreeNode::new(1, "root"),
            TreeNode::new(2, "Controllers").parent(1),
            TreeNode::new(3, "Pages").parent(2),
        ]);

        let path = store.ancestor_path(TreeKind::Aco, 3).await.unwrap();
        let aliases: Vec<&str> = path.iter().map(|n| n.alias.as_str()).collect();
        assert_eq!(aliases, vec!["root", "Controllers", "Pages"]);

        assert!(store.ancestor_path(TreeKind::Aco, 99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ancestor_path_detects_cycles() {
        let store = tree(vec![
            TreeNode::new(1, "a").parent(2),
            TreeNode::new(2, "b").parent(1),
        ]);

        let result = store.ancestor_path(TreeKind::Aro, 1).await;
        assert!(matches!(result, Err(AclError::TreeCycle { .. })));
    }

    #[tokio::test]
    async fn test_ancestor_path_rejects_dangling_parent() {
        let store = tree(vec![TreeNode::new(2, "orphan").parent(1)]);

        let result = store.ancestor_path(TreeKind::Aco, 2).await;
        assert!(matches!(result, Err(AclError::InvalidNode { node_id: 2, .. })));
    }

    #[tokio::test]
    async fn test_child_count() {
        let store = tree(vec![
            TreeNode::new(1, "root"),
            TreeNode::new(2, "Controllers").parent(1),
            TreeNode::new(3, "Pages").parent(2),
            TreeNode::new(4, "index").parent(3),
            TreeNode::new(5, "view").parent(3),
        ]);

        assert_eq!(store.child_count(TreeKind::Aco, 1, false).await.unwrap(), 1);
        assert_eq!(store.child_count(TreeKind::Aco, 1, true).await.unwrap(), 4);
        assert_eq!(store.child_count(TreeKind::Aco, 3, true).await.unwrap(), 2);
        assert_eq!(store.child_count(TreeKind::Aco, 4, true).await.unwrap(), 0);
    }
}
