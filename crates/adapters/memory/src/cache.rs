//! In-memory grouped cache.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tree_acl_core::config::CacheSettings;
use tree_acl_core::error::AclResult;
use tree_acl_core::traits::CacheStore;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    generation: u64,
    stored_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CacheState {
    // group -> generation; bumped on every eviction
    generations: HashMap<String, u64>,
    entries: HashMap<(String, String), CacheEntry>,
}

impl CacheState {
    fn generation(&self, group: &str) -> u64 {
        self.generations.get(group).copied().unwrap_or(0)
    }
}

/// Grouped cache backed by a single lock.
///
/// Every entry remembers the generation of its group at write time. An
/// eviction bumps the generation under the write lock, so an entry written
/// before the eviction can never be read after it. Results computed before
/// an eviction but written after it are rejected by `set_if_generation`.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    state: Arc<RwLock<CacheState>>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    /// Creates a cache whose entries never expire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache whose entries expire after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    /// Creates a cache from settings; a zero TTL disables expiry.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        match settings.ttl_seconds {
            0 => Self::new(),
            secs => Self::with_ttl(Duration::seconds(secs as i64)),
        }
    }

    /// Returns how many times `group` has been evicted.
    pub async fn generation(&self, group: &str) -> u64 {
        self.state.read().await.generation(group)
    }

    /// Returns the number of live entries in `group`.
    pub async fn len(&self, group: &str) -> usize {
        let state = self.state.read().await;
        let generation = state.generation(group);
        state
            .entries
            .iter()
            .filter(|((g, _), entry)| {
                g == group && entry.generation == generation && !self.is_expired(entry)
            })
            .count()
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_some_and(|ttl| Utc::now() - entry.stored_at > ttl)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, group: &str, key: &str) -> AclResult<Option<Value>> {
        let state = self.state.read().await;
        let generation = state.generation(group);

        Ok(state
            .entries
            .get(&(group.to_string(), key.to_string()))
            .filter(|entry| entry.generation == generation && !self.is_expired(entry))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, group: &str, key: &str, value: Value) -> AclResult<()> {
        let mut state = self.state.write().await;
        let generation = state.generation(group);

        state.entries.insert(
            (group.to_string(), key.to_string()),
            CacheEntry {
                value,
                generation,
                stored_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn group_generation(&self, group: &str) -> AclResult<u64> {
        Ok(self.state.read().await.generation(group))
    }

    async fn set_if_generation(
        &self,
        group: &str,
        key: &str,
        value: Value,
        generation: u64,
    ) -> AclResult<bool> {
        let mut state = self.state.write().await;
        if state.generation(group) != generation {
            tracing::trace!(group, key, generation, "Dropped write for evicted generation");
            return Ok(false);
        }

        state.entries.insert(
            (group.to_string(), key.to_string()),
            CacheEntry {
                value,
                generation,
                stored_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn evict_group(&self, group: &str) -> AclResult<()> {
        let mut state = self.state.write().await;
        *state.generations.entry(group.to_string()).or_insert(0) += 1;
        state.entries.retain(|(g, _), _| g != group);

        tracing::trace!(group, "Evicted cache group");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();
        cache
            .set("permissions", "role.1", json!(["Controllers/Pages/index"]))
            .await
            .unwrap();

        let value = cache.get("permissions", "role.1").await.unwrap();
        assert_eq!(value, Some(json!(["Controllers/Pages/index"])));
        assert_eq!(cache.get("permissions", "role.2").await.unwrap(), None);
        assert_eq!(cache.get("other", "role.1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_evict_group_only_touches_that_group() {
        let cache = MemoryCache::new();
        cache.set("permissions", "a", json!(1)).await.unwrap();
        cache.set("menus", "a", json!(2)).await.unwrap();

        cache.evict_group("permissions").await.unwrap();

        assert_eq!(cache.get("permissions", "a").await.unwrap(), None);
        assert_eq!(cache.get("menus", "a").await.unwrap(), Some(json!(2)));
        assert_eq!(cache.generation("permissions").await, 1);
        assert_eq!(cache.generation("menus").await, 0);
        assert_eq!(cache.len("menus").await, 1);
    }

    #[tokio::test]
    async fn test_entries_written_after_eviction_are_visible() {
        let cache = MemoryCache::new();
        cache.evict_group("permissions").await.unwrap();
        cache.set("permissions", "a", json!(true)).await.unwrap();

        assert_eq!(cache.get("permissions", "a").await.unwrap(), Some(json!(true)));
        assert_eq!(cache.len("permissions").await, 1);
    }

    #[tokio::test]
    async fn test_conditional_set_rejects_evicted_generation() {
        let cache = MemoryCache::new();
        let before = cache.group_generation("permissions").await.unwrap();
        assert_eq!(before, 0);

        cache.evict_group("permissions").await.unwrap();

        let stored = cache
            .set_if_generation("permissions", "role.1", json!(["Nodes"]), before)
            .await
            .unwrap();
        assert!(!stored);
        assert_eq!(cache.get("permissions", "role.1").await.unwrap(), None);

        let current = cache.group_generation("permissions").await.unwrap();
        let stored = cache
            .set_if_generation("permissions", "role.1", json!([]), current)
            .await
            .unwrap();
        assert!(stored);
        assert_eq!(cache.get("permissions", "role.1").await.unwrap(), Some(json!([])));
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = MemoryCache::with_ttl(Duration::milliseconds(10));
        cache.set("permissions", "a", json!(1)).await.unwrap();
        assert!(cache.get("permissions", "a").await.unwrap().is_some());

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(cache.get("permissions", "a").await.unwrap().is_none());
    }

    #[test]
    fn test_from_settings() {
        let cache = MemoryCache::from_settings(&CacheSettings::default());
        assert!(cache.ttl.is_none());

        let settings = CacheSettings {
            ttl_seconds: 60,
            ..CacheSettings::default()
        };
        let cache = MemoryCache::from_settings(&settings);
        assert_eq!(cache.ttl, Some(Duration::seconds(60)));
    }
}
