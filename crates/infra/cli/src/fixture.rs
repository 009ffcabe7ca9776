//! TOML fixtures describing a complete ACL state.
//!
//! ```toml
//! [settings]
//! multi_role = true
//!
//! [[aros]]
//! id = 1
//! alias = "Role-admin"
//! model = "Roles"
//! foreign_key = 1
//!
//! [[acos]]
//! id = 1
//! alias = "Controllers"
//!
//! [[permissions]]
//! aro_id = 1
//! aco_id = 1
//! create = true
//! read = true
//! update = true
//! delete = true
//!
//! [[memberships]]
//! user_id = 7
//! roles = [1]
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tree_acl_adapter_memory::{MemoryAdapter, MemoryCache};
use tree_acl_core::{
    AclError, AclResult, AclSettings, NodeId, PermissionRecord, PermissionStore, TreeKind,
    TreeNode, TreeStore,
};
use tree_acl_permissions::AclPermissions;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub settings: AclSettings,
    pub aros: Vec<TreeNode>,
    pub acos: Vec<TreeNode>,
    pub permissions: Vec<PermissionRecord>,
    pub memberships: Vec<Membership>,
}

/// Roles held by one user, as ARO node ids.
#[derive(Debug, Deserialize)]
pub struct Membership {
    pub user_id: i64,
    pub roles: Vec<NodeId>,
}

impl Fixture {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid fixture {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let fixture: Self = toml::from_str(content)?;
        fixture.settings.validate()?;
        Ok(fixture)
    }

    /// Wires a permission facade over `adapter` with a cache built from the
    /// fixture settings.
    pub fn permissions(&self, adapter: Arc<MemoryAdapter>) -> AclResult<AclPermissions> {
        AclPermissions::builder()
            .tree_store(adapter.clone())
            .permission_store(adapter.clone())
            .membership(adapter)
            .cache(Arc::new(MemoryCache::from_settings(&self.settings.cache)))
            .settings(Arc::new(self.settings.clone()))
            .build()
    }

    /// Foreign key to ARO id of every subject owned by `model`.
    pub fn subjects(&self, model: &str) -> BTreeMap<i64, NodeId> {
        self.aros
            .iter()
            .filter(|n| n.model.as_deref() == Some(model))
            .filter_map(|n| n.foreign_key.map(|fk| (fk, n.id)))
            .collect()
    }

    /// Loads every node, record and membership into `adapter`.
    pub async fn seed(&self, adapter: &MemoryAdapter) -> AclResult<()> {
        seed_tree(adapter, TreeKind::Aro, &self.aros).await?;
        seed_tree(adapter, TreeKind::Aco, &self.acos).await?;

        for record in &self.permissions {
            adapter.create_permission(record).await?;
        }
        for membership in &self.memberships {
            for &role in &membership.roles {
                adapter.add_role_membership(membership.user_id, role).await;
            }
        }

        tracing::debug!(
            aros = self.aros.len(),
            acos = self.acos.len(),
            permissions = self.permissions.len(),
            "Seeded fixture"
        );
        Ok(())
    }
}

// Nodes may be listed in any order; parents are stored before their children.
async fn seed_tree(adapter: &MemoryAdapter, tree: TreeKind, nodes: &[TreeNode]) -> AclResult<()> {
    let mut stored: HashSet<NodeId> = HashSet::new();
    let mut pending: Vec<&TreeNode> = nodes.iter().collect();

    while !pending.is_empty() {
        let (ready, blocked): (Vec<&TreeNode>, Vec<&TreeNode>) = pending
            .into_iter()
            .partition(|n| n.parent_id.is_none_or(|p| stored.contains(&p)));

        if ready.is_empty() {
            let node = blocked[0];
            return Err(AclError::invalid_node(
                tree,
                node.id,
                format!(
                    "parent {} is not part of the fixture",
                    node.parent_id.unwrap_or_default()
                ),
            ));
        }

        for node in ready {
            adapter.save_node(tree, node).await?;
            stored.insert(node.id);
        }
        pending = blocked;
    }

    Ok(())
}
