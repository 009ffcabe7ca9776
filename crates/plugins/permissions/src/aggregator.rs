//! Allowed-action aggregation.
//!
//! Collects the resource paths a set of ARO nodes may fully access. "Full"
//! means create, read, update and delete are all granted; partial records
//! never show up here.

use std::sync::Arc;
use tree_acl_core::error::{AclError, AclResult};
use tree_acl_core::traits::{CacheStore, PermissionStore, SettingsProvider};
use tree_acl_core::types::{NodeId, TreeKind};

use crate::membership::RoleMembershipResolver;
use crate::path::PathResolver;

/// Aggregates full CRUD grants into resource paths.
#[derive(Clone)]
pub struct PermissionAggregator {
    permissions: Arc<dyn PermissionStore>,
    paths: PathResolver,
    subjects: RoleMembershipResolver,
    cache: Option<Arc<dyn CacheStore>>,
    settings: Arc<dyn SettingsProvider>,
}

impl PermissionAggregator {
    pub fn new(
        permissions: Arc<dyn PermissionStore>,
        paths: PathResolver,
        subjects: RoleMembershipResolver,
        cache: Option<Arc<dyn CacheStore>>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            permissions,
            paths,
            subjects,
            cache,
            settings,
        }
    }

    /// Resource paths fully granted to a role, e.g. `Controllers/Pages/index`.
    pub async fn allowed_actions_by_role_id(&self, role_id: i64) -> AclResult<Vec<String>> {
        let key = format!("allowed_actions.role.{role_id}");
        let generation = match self.lookup(&key).await {
            Lookup::Hit(paths) => return Ok(paths),
            Lookup::Miss { generation } => generation,
        };

        let Some(aro_id) = self.subjects.role_aro_id(role_id).await? else {
            tracing::debug!(role_id, "Role has no ARO node");
            return Ok(Vec::new());
        };

        let paths = self.allowed_paths_for_aro_ids(&[aro_id]).await?;
        self.store(&key, &paths, generation).await;
        Ok(paths)
    }

    /// Resource paths fully granted to a user, through the user's own node
    /// and, in multi-role mode, every role the user holds.
    pub async fn allowed_actions_by_user_id(&self, user_id: i64) -> AclResult<Vec<String>> {
        let key = format!("allowed_actions.user.{user_id}");
        let generation = match self.lookup(&key).await {
            Lookup::Hit(paths) => return Ok(paths),
            Lookup::Miss { generation } => generation,
        };

        let aro_ids = self.subjects.subject_aro_ids(user_id).await?;
        if aro_ids.is_empty() {
            return Ok(Vec::new());
        }

        let paths = self.allowed_paths_for_aro_ids(&aro_ids).await?;
        self.store(&key, &paths, generation).await;
        Ok(paths)
    }

    /// Resource paths fully granted to any of `aro_ids`, deduplicated by
    /// value in first-discovered order.
    ///
    /// Records whose resource node no longer resolves are skipped: a missing
    /// node, a dangling parent link or a cycle above it. Storage failures
    /// still fail the whole call.
    pub async fn allowed_paths_for_aro_ids(&self, aro_ids: &[NodeId]) -> AclResult<Vec<String>> {
        let records = self.permissions.find_full_grants(aro_ids).await?;

        let mut paths: Vec<String> = Vec::with_capacity(records.len());
        for record in records {
            let path = match self.paths.resolve(TreeKind::Aco, record.aco_id).await {
                Ok(Some(path)) => path,
                Ok(None) => {
                    tracing::debug!(
                        permission_id = record.id,
                        aco_id = record.aco_id,
                        "Skipping permission for missing ACO node"
                    );
                    continue;
                }
                Err(e @ (AclError::InvalidNode { .. } | AclError::TreeCycle { .. })) => {
                    tracing::warn!(
                        permission_id = record.id,
                        aco_id = record.aco_id,
                        error = %e,
                        "Skipping permission for unresolvable ACO path"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            if !paths.contains(&path) {
                paths.push(path);
            }
        }

        Ok(paths)
    }

    // The generation is read before the entry so a miss can only be stored
    // back if no eviction happened while the result was being computed.
    async fn lookup(&self, key: &str) -> Lookup {
        let Some(cache) = self.active_cache() else {
            return Lookup::Miss { generation: None };
        };
        let group = self.settings.cache_group();

        let generation = match cache.group_generation(group).await {
            Ok(generation) => generation,
            Err(e) => {
                tracing::warn!(group, key, error = %e, "Cache generation read failed");
                return Lookup::Miss { generation: None };
            }
        };

        match cache.get(group, key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(paths) => return Lookup::Hit(paths),
                Err(e) => {
                    tracing::warn!(group, key, error = %e, "Discarding malformed cache entry");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(group, key, error = %e, "Cache read failed");
            }
        }

        Lookup::Miss {
            generation: Some(generation),
        }
    }

    async fn store(&self, key: &str, paths: &[String], generation: Option<u64>) {
        let (Some(cache), Some(generation)) = (self.active_cache(), generation) else {
            return;
        };
        let group = self.settings.cache_group();

        let result = match serde_json::to_value(paths) {
            Ok(value) => cache.set_if_generation(group, key, value, generation).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(
                    group,
                    key,
                    generation,
                    "Group evicted during lookup, not caching"
                );
            }
            Err(e) => tracing::warn!(group, key, error = %e, "Cache write failed"),
        }
    }

    fn active_cache(&self) -> Option<&Arc<dyn CacheStore>> {
        if !self.settings.cache_enabled() {
            return None;
        }
        self.cache.as_ref()
    }
}

enum Lookup {
    Hit(Vec<String>),
    /// `generation` is `None` when the result must not be cached.
    Miss { generation: Option<u64> },
}
