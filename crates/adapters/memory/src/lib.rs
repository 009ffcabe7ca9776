//! # Tree ACL Memory Adapter
//!
//! An in-memory implementation of the Tree ACL storage ports, primarily
//! intended for testing and development purposes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tree_acl_adapter_memory::{MemoryAdapter, MemoryCache};
//!
//! let adapter = Arc::new(MemoryAdapter::new());
//! let acl = AclPermissions::builder()
//!     .tree_store(adapter.clone())
//!     .permission_store(adapter.clone())
//!     .membership(adapter)
//!     .cache(Arc::new(MemoryCache::new()))
//!     .build()?;
//! ```

mod cache;

pub use cache::MemoryCache;

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tree_acl_core::error::{AclError, AclResult};
use tree_acl_core::traits::{MembershipProvider, PermissionStore, TreeStore};
use tree_acl_core::types::{NodeId, PermissionRecord, TreeKind, TreeNode};

/// In-memory storage for a single entity type, ordered by key.
type Store<T> = Arc<RwLock<BTreeMap<i64, T>>>;

/// In-memory storage adapter for Tree ACL.
///
/// This adapter stores all data in memory and is suitable for
/// testing and development. Data is lost when the process exits.
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    aros: Store<TreeNode>,
    acos: Store<TreeNode>,
    permissions: Store<PermissionRecord>,
    // user id -> role ARO ids, in assignment order
    memberships: Arc<RwLock<HashMap<i64, Vec<NodeId>>>>,
}

impl MemoryAdapter {
    /// Creates a new in-memory adapter.
    pub fn new() -> Self {
        Self {
            aros: Arc::new(RwLock::new(BTreeMap::new())),
            acos: Arc::new(RwLock::new(BTreeMap::new())),
            permissions: Arc::new(RwLock::new(BTreeMap::new())),
            memberships: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the number of nodes stored in a tree.
    pub async fn node_count(&self, tree: TreeKind) -> usize {
        self.nodes(tree).read().await.len()
    }

    /// Returns the number of permission records stored.
    pub async fn permission_count(&self) -> usize {
        self.permissions.read().await.len()
    }

    /// Records that `user_id` holds the role whose ARO node is `role_aro_id`.
    pub async fn add_role_membership(&self, user_id: i64, role_aro_id: NodeId) {
        let mut memberships = self.memberships.write().await;
        let roles = memberships.entry(user_id).or_default();
        if !roles.contains(&role_aro_id) {
            roles.push(role_aro_id);
        }
    }

    /// Removes a role from a user.
    pub async fn remove_role_membership(&self, user_id: i64, role_aro_id: NodeId) {
        let mut memberships = self.memberships.write().await;
        if let Some(roles) = memberships.get_mut(&user_id) {
            roles.retain(|id| *id != role_aro_id);
        }
    }

    fn nodes(&self, tree: TreeKind) -> &Store<TreeNode> {
        match tree {
            TreeKind::Aro => &self.aros,
            TreeKind::Aco => &self.acos,
        }
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks that storing `node` keeps the tree acyclic and rooted.
fn validate_node(
    tree: TreeKind,
    nodes: &BTreeMap<i64, TreeNode>,
    node: &TreeNode,
) -> AclResult<()> {
    if node.alias.is_empty() {
        return Err(AclError::invalid_node(tree, node.id, "alias must not be empty"));
    }

    if let (Some(model), Some(foreign_key)) = (&node.model, node.foreign_key) {
        let taken = nodes
            .values()
            .any(|n| n.id != node.id && n.is_owned_by(model, foreign_key));
        if taken {
            return Err(AclError::duplicate(
                tree.as_str(),
                "owner",
                format!("{model}.{foreign_key}"),
            ));
        }
    }

    let mut current = node.parent_id;
    let mut steps = 0;
    while let Some(parent_id) = current {
        if parent_id == node.id {
            return Err(AclError::invalid_node(
                tree,
                node.id,
                "node cannot be its own ancestor",
            ));
        }
        let parent = nodes.get(&parent_id).ok_or_else(|| {
            AclError::invalid_node(tree, node.id, format!("parent {parent_id} does not exist"))
        })?;
        current = parent.parent_id;

        steps += 1;
        if steps > nodes.len() {
            return Err(AclError::TreeCycle {
                tree: tree.to_string(),
                node_id: parent_id,
            });
        }
    }

    Ok(())
}

#[async_trait]
impl TreeStore for MemoryAdapter {
    // ==================== Node Lookups ====================

    async fn get_node(&self, tree: TreeKind, id: NodeId) -> AclResult<Option<TreeNode>> {
        let nodes = self.nodes(tree).read().await;
        Ok(nodes.get(&id).cloned())
    }

    async fn children(
        &self,
        tree: TreeKind,
        parent_id: Option<NodeId>,
    ) -> AclResult<Vec<TreeNode>> {
        let nodes = self.nodes(tree).read().await;
        Ok(nodes
            .values()
            .filter(|n| n.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn find_node_by_owner(
        &self,
        tree: TreeKind,
        model: &str,
        foreign_key: i64,
    ) -> AclResult<Option<TreeNode>> {
        let nodes = self.nodes(tree).read().await;
        Ok(nodes
            .values()
            .find(|n| n.is_owned_by(model, foreign_key))
            .cloned())
    }

    // ==================== Structural Administration ====================

    async fn save_node(&self, tree: TreeKind, node: &TreeNode) -> AclResult<TreeNode> {
        let mut nodes = self.nodes(tree).write().await;
        validate_node(tree, &nodes, node)?;
        nodes.insert(node.id, node.clone());
        Ok(node.clone())
    }

    async fn delete_node(&self, tree: TreeKind, id: NodeId) -> AclResult<()> {
        let mut nodes = self.nodes(tree).write().await;
        if !nodes.contains_key(&id) {
            return Err(AclError::not_found(tree.as_str(), "id", id));
        }

        // Remove the whole subtree; permission records pointing at it are left
        // in place, the same way a database without cascading deletes would.
        let mut doomed = vec![id];
        let mut index = 0;
        while index < doomed.len() {
            let parent = doomed[index];
            doomed.extend(
                nodes
                    .values()
                    .filter(|n| n.parent_id == Some(parent))
                    .map(|n| n.id),
            );
            index += 1;
        }
        for node_id in doomed {
            nodes.remove(&node_id);
        }

        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryAdapter {
    async fn get_permission(&self, id: i64) -> AclResult<Option<PermissionRecord>> {
        let permissions = self.permissions.read().await;
        Ok(permissions.get(&id).cloned())
    }

    async fn find_permission(
        &self,
        aro_id: NodeId,
        aco_id: NodeId,
    ) -> AclResult<Option<PermissionRecord>> {
        let permissions = self.permissions.read().await;
        Ok(permissions
            .values()
            .find(|p| p.aro_id == aro_id && p.aco_id == aco_id)
            .cloned())
    }

    async fn find_by_aros(&self, aro_ids: &[NodeId]) -> AclResult<Vec<PermissionRecord>> {
        let permissions = self.permissions.read().await;
        Ok(permissions
            .values()
            .filter(|p| aro_ids.contains(&p.aro_id))
            .cloned()
            .collect())
    }

    async fn create_permission(&self, record: &PermissionRecord) -> AclResult<PermissionRecord> {
        let mut permissions = self.permissions.write().await;

        let mut stored = record.clone();
        if stored.is_new() {
            stored.id = permissions.keys().next_back().map_or(1, |last| last + 1);
        } else if permissions.contains_key(&stored.id) {
            return Err(AclError::duplicate("permission", "id", stored.id));
        }

        permissions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_permission(&self, record: &PermissionRecord) -> AclResult<PermissionRecord> {
        let mut permissions = self.permissions.write().await;

        if !permissions.contains_key(&record.id) {
            return Err(AclError::not_found("permission", "id", record.id));
        }

        permissions.insert(record.id, record.clone());
        Ok(record.clone())
    }

    async fn delete_permission(&self, id: i64) -> AclResult<()> {
        let mut permissions = self.permissions.write().await;
        permissions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AclError::not_found("permission", "id", id))
    }
}

#[async_trait]
impl MembershipProvider for MemoryAdapter {
    async fn roles_for_user(&self, user_id: i64) -> AclResult<Vec<NodeId>> {
        let memberships = self.memberships.read().await;
        Ok(memberships.get(&user_id).cloned().unwrap_or_default())
    }
}
