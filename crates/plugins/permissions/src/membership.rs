//! Subject resolution: which ARO nodes act for a user or a role.

use std::sync::Arc;
use tree_acl_core::error::{AclError, AclResult};
use tree_acl_core::traits::{MembershipProvider, SettingsProvider, TreeStore};
use tree_acl_core::types::{NodeId, ROLES_MODEL, RoleReference, TreeKind, USERS_MODEL};

/// Resolves user and role ids to ARO node ids.
#[derive(Clone)]
pub struct RoleMembershipResolver {
    trees: Arc<dyn TreeStore>,
    membership: Option<Arc<dyn MembershipProvider>>,
    settings: Arc<dyn SettingsProvider>,
}

impl RoleMembershipResolver {
    pub fn new(
        trees: Arc<dyn TreeStore>,
        membership: Option<Arc<dyn MembershipProvider>>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            trees,
            membership,
            settings,
        }
    }

    /// Looks up the ARO node id owned by `reference`.
    pub async fn aro_id(&self, reference: &RoleReference) -> AclResult<Option<NodeId>> {
        let node = self
            .trees
            .find_node_by_owner(TreeKind::Aro, &reference.model, reference.foreign_key)
            .await?;
        Ok(node.map(|n| n.id))
    }

    /// Looks up the ARO node id of a role.
    pub async fn role_aro_id(&self, role_id: i64) -> AclResult<Option<NodeId>> {
        self.aro_id(&RoleReference::new(ROLES_MODEL, role_id)).await
    }

    /// Returns the ARO ids acting for `user_id`: the user's own node first,
    /// then, in multi-role mode, every role node the user holds.
    ///
    /// A user without an ARO node resolves to an empty list. In multi-role
    /// mode a missing or failing membership lookup is an error.
    pub async fn subject_aro_ids(&self, user_id: i64) -> AclResult<Vec<NodeId>> {
        let Some(own_id) = self.aro_id(&RoleReference::new(USERS_MODEL, user_id)).await? else {
            tracing::debug!(user_id, "User has no ARO node");
            return Ok(Vec::new());
        };

        let mut aro_ids = vec![own_id];
        if !self.settings.multi_role_enabled() {
            return Ok(aro_ids);
        }

        let membership = self.membership.as_ref().ok_or_else(|| {
            AclError::membership("multi-role mode is enabled but no membership provider is set")
        })?;
        let role_ids = membership
            .roles_for_user(user_id)
            .await
            .map_err(|e| match e {
                AclError::MembershipUnavailable { .. } => e,
                other => AclError::membership(other.to_string()),
            })?;

        for role_id in role_ids {
            if !aro_ids.contains(&role_id) {
                aro_ids.push(role_id);
            }
        }

        tracing::debug!(user_id, aro_ids = ?aro_ids, "Resolved subject ARO ids");
        Ok(aro_ids)
    }
}
