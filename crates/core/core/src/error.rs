//! Error types for Tree ACL.
//!
//! This module defines the `AclError` enum which represents every failure
//! the permission core can surface. "No access" is never an error: callers
//! receive empty results for subjects without tree nodes.

use thiserror::Error;

/// The main error type for Tree ACL operations.
#[derive(Debug, Error)]
pub enum AclError {
    // ==================== Storage Errors ====================
    /// A database operation failed.
    #[error("Database error: {message}")]
    DatabaseError { message: String },

    /// The requested record was not found.
    #[error("Record not found: {entity} with {key}={value}")]
    NotFound {
        entity: String,
        key: String,
        value: String,
    },

    /// A unique constraint was violated.
    #[error("Duplicate entry: {entity} with {field}={value} already exists")]
    DuplicateEntry {
        entity: String,
        field: String,
        value: String,
    },

    // ==================== Tree Errors ====================
    /// A parent chain loops back on itself.
    #[error("Cycle detected in {tree} tree at node {node_id}")]
    TreeCycle { tree: String, node_id: i64 },

    /// A node cannot be stored as given (unknown parent, self-parent, ...).
    #[error("Invalid {tree} node {node_id}: {reason}")]
    InvalidNode {
        tree: String,
        node_id: i64,
        reason: String,
    },

    // ==================== Collaborator Errors ====================
    /// The role membership lookup failed or is not configured.
    #[error("Role membership unavailable: {message}")]
    MembershipUnavailable { message: String },

    /// A cache operation failed.
    #[error("Cache error: {message}")]
    CacheError { message: String },

    // ==================== Configuration Errors ====================
    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// A required configuration value or collaborator is missing.
    #[error("Missing configuration: {key}")]
    MissingConfiguration { key: String },

    // ==================== Serialization Errors ====================
    /// Serialization/deserialization failed.
    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

impl AclError {
    /// Creates a new database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::DatabaseError {
            message: message.into(),
        }
    }

    /// Creates a new not found error.
    pub fn not_found(
        entity: impl Into<String>,
        key: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.into(),
            value: value.to_string(),
        }
    }

    /// Creates a new duplicate entry error.
    pub fn duplicate(
        entity: impl Into<String>,
        field: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self::DuplicateEntry {
            entity: entity.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Creates a new invalid node error.
    pub fn invalid_node(tree: impl ToString, node_id: i64, reason: impl Into<String>) -> Self {
        Self::InvalidNode {
            tree: tree.to_string(),
            node_id,
            reason: reason.into(),
        }
    }

    /// Creates a new membership error.
    pub fn membership(message: impl Into<String>) -> Self {
        Self::MembershipUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::CacheError {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Returns true if this error was caused by caller input rather than
    /// the storage or collaborator layer.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::DuplicateEntry { .. } | Self::InvalidNode { .. }
        )
    }

    /// Returns an HTTP status code appropriate for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::DuplicateEntry { .. } => 409,
            Self::InvalidNode { .. } => 422,
            Self::MembershipUnavailable { .. } => 503,
            _ => 500,
        }
    }
}

/// A Result type alias using AclError.
pub type AclResult<T> = Result<T, AclError>;

impl From<serde_json::Error> for AclError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AclError::not_found("aco", "id", 42);
        assert_eq!(err.to_string(), "Record not found: aco with id=42");

        let err = AclError::TreeCycle {
            tree: "aro".into(),
            node_id: 7,
        };
        assert_eq!(err.to_string(), "Cycle detected in aro tree at node 7");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AclError::not_found("aro", "id", 1).status_code(), 404);
        assert_eq!(AclError::duplicate("permission", "aro_aco", "1/2").status_code(), 409);
        assert_eq!(AclError::membership("down").status_code(), 503);
        assert_eq!(AclError::cache("evict failed").status_code(), 500);
    }

    #[test]
    fn test_is_user_error() {
        assert!(AclError::not_found("aco", "path", "Controllers/Nope").is_user_error());
        assert!(!AclError::database("connection reset").is_user_error());
    }
}
