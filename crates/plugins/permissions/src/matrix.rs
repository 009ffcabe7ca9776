//! Permission matrix for administration screens.

use std::collections::BTreeMap;
use std::sync::Arc;
use tree_acl_core::error::{AclError, AclResult};
use tree_acl_core::traits::TreeStore;
use tree_acl_core::types::{NodeId, RoleReference, TreeKind, TreeNode};

use crate::check::PermissionChecker;
use crate::path::{PathResolver, path_depth};
use crate::types::{FormatOptions, MatrixEntry, PermissionMatrix};

/// Builds the resource by subject grant grid.
#[derive(Clone)]
pub struct MatrixFormatter {
    trees: Arc<dyn TreeStore>,
    paths: PathResolver,
    checker: PermissionChecker,
}

impl MatrixFormatter {
    pub fn new(trees: Arc<dyn TreeStore>, paths: PathResolver, checker: PermissionChecker) -> Self {
        Self {
            trees,
            paths,
            checker,
        }
    }

    /// Formats one row per resource node.
    ///
    /// `aros` maps subject foreign keys (of `options.model`) to their ARO
    /// node ids. Every subject gets its own cell in each row's `roles` map.
    pub async fn format(
        &self,
        acos: &[TreeNode],
        aros: &BTreeMap<i64, NodeId>,
        options: &FormatOptions,
    ) -> AclResult<PermissionMatrix> {
        let mut matrix = PermissionMatrix::new();

        for aco in acos {
            let path = self
                .paths
                .resolve(TreeKind::Aco, aco.id)
                .await?
                .ok_or_else(|| AclError::not_found("aco", "id", aco.id))?;
            let children = self.trees.child_count(TreeKind::Aco, aco.id, true).await?;

            let roles = if options.include_perms {
                let mut roles = BTreeMap::new();
                for &foreign_key in aros.keys() {
                    let granted = if options.superadmin_key == Some(foreign_key) {
                        true
                    } else {
                        let subject = RoleReference::new(options.model.as_str(), foreign_key);
                        self.checker.check(&subject, &path).await?
                    };
                    roles.insert(foreign_key, u8::from(granted));
                }
                Some(roles)
            } else {
                None
            };

            matrix.insert(
                aco.id,
                MatrixEntry {
                    alias: aco.alias.clone(),
                    children,
                    depth: path_depth(&path),
                    roles,
                },
            );
        }

        tracing::debug!(
            resources = matrix.len(),
            subjects = aros.len(),
            model = %options.model,
            "Formatted permission matrix"
        );
        Ok(matrix)
    }
}
