//! Cache invalidation after permission writes.

use std::sync::Arc;
use tree_acl_core::error::AclResult;
use tree_acl_core::traits::{CacheStore, SettingsProvider};

/// Evicts the permission cache group whenever a record changes.
///
/// Cached results also depend on node aliases, parent links and role
/// memberships, none of which pass through this crate. Whoever changes
/// them calls [`on_structure_changed`](Self::on_structure_changed).
#[derive(Clone)]
pub struct PermissionInvalidator {
    cache: Option<Arc<dyn CacheStore>>,
    settings: Arc<dyn SettingsProvider>,
}

impl PermissionInvalidator {
    pub fn new(cache: Option<Arc<dyn CacheStore>>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self { cache, settings }
    }

    /// Call after a record was created or updated.
    pub async fn on_permission_persisted(&self) -> AclResult<()> {
        self.evict("persisted").await
    }

    /// Call after a record was deleted.
    pub async fn on_permission_deleted(&self) -> AclResult<()> {
        self.evict("deleted").await
    }

    /// Call after a tree node was renamed, moved or deleted, or after a
    /// user's role memberships changed.
    pub async fn on_structure_changed(&self) -> AclResult<()> {
        self.evict("structure").await
    }

    // Evicts even when reads bypass the cache, so re-enabling it never
    // serves entries from before the write.
    async fn evict(&self, cause: &'static str) -> AclResult<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };

        let group = self.settings.cache_group();
        cache.evict_group(group).await?;
        tracing::debug!(group, cause, "Evicted permission cache group");
        Ok(())
    }
}
