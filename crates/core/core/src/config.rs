//! Settings for the permission core.
//!
//! Settings are loaded from TOML. Every key is optional:
//!
//! ```toml
//! multi_role = true
//! log_level = "debug"
//!
//! [cache]
//! enabled = true
//! group = "permissions"
//! ttl_seconds = 3600
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AclError, AclResult};
use crate::traits::{PERMISSIONS_CACHE_GROUP, SettingsProvider};

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclSettings {
    /// Users inherit the permissions of every role they hold.
    pub multi_role: bool,
    /// Log level for binaries.
    pub log_level: String,
    /// Result cache settings.
    pub cache: CacheSettings,
}

impl Default for AclSettings {
    fn default() -> Self {
        Self {
            multi_role: false,
            log_level: "info".to_string(),
            cache: CacheSettings::default(),
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache aggregated permission results.
    pub enabled: bool,
    /// Group evicted on every permission write.
    pub group: String,
    /// Lifetime of cached entries in seconds, `0` for no expiry.
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            group: PERMISSIONS_CACHE_GROUP.to_string(),
            ttl_seconds: 0,
        }
    }
}

impl AclSettings {
    /// Parses settings from a TOML document.
    pub fn from_toml_str(content: &str) -> AclResult<Self> {
        let settings: Self = toml::from_str(content).map_err(|e| AclError::config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> AclResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AclError::config(format!("{}: {e}", path.display())))?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            multi_role = settings.multi_role,
            "Loaded ACL settings"
        );
        Ok(settings)
    }

    /// Enables or disables multi-role mode.
    pub fn with_multi_role(mut self, enabled: bool) -> Self {
        self.multi_role = enabled;
        self
    }

    /// Checks values serde cannot: the cache group must be non-empty.
    ///
    /// Settings embedded in a larger document must be validated explicitly.
    pub fn validate(&self) -> AclResult<()> {
        if self.cache.group.trim().is_empty() {
            return Err(AclError::config("cache.group must not be empty"));
        }
        Ok(())
    }
}

impl SettingsProvider for AclSettings {
    fn multi_role_enabled(&self) -> bool {
        self.multi_role
    }

    fn cache_enabled(&self) -> bool {
        self.cache.enabled
    }

    fn cache_group(&self) -> &str {
        &self.cache.group
    }
}
