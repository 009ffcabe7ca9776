//! Resource path reconstruction.

use std::sync::Arc;
use tree_acl_core::error::AclResult;
use tree_acl_core::traits::TreeStore;
use tree_acl_core::types::{NodeId, PATH_SEPARATOR, TreeKind, TreeNode};

/// Turns tree nodes into alias paths and back.
#[derive(Clone)]
pub struct PathResolver {
    trees: Arc<dyn TreeStore>,
}

impl PathResolver {
    pub fn new(trees: Arc<dyn TreeStore>) -> Self {
        Self { trees }
    }

    /// Builds the alias path of `id`, root first, joined with `/`.
    ///
    /// Returns `Ok(None)` when the node does not exist.
    pub async fn resolve(&self, tree: TreeKind, id: NodeId) -> AclResult<Option<String>> {
        let path = self.trees.ancestor_path(tree, id).await?;
        if path.is_empty() {
            return Ok(None);
        }
        Ok(Some(join_aliases(&path)))
    }

    /// Finds the node whose alias path is exactly `path`.
    pub async fn find_by_path(&self, tree: TreeKind, path: &str) -> AclResult<Option<TreeNode>> {
        if path.is_empty() {
            return Ok(None);
        }

        let mut parent: Option<NodeId> = None;
        let mut found = None;

        for segment in path.split(PATH_SEPARATOR) {
            if segment.is_empty() {
                return Ok(None);
            }
            let children = self.trees.children(tree, parent).await?;
            match children.into_iter().find(|n| n.alias == segment) {
                Some(node) => {
                    parent = Some(node.id);
                    found = Some(node);
                }
                None => return Ok(None),
            }
        }

        Ok(found)
    }
}

/// Joins node aliases with the path separator.
pub fn join_aliases(nodes: &[TreeNode]) -> String {
    let separator = PATH_SEPARATOR.to_string();
    let aliases: Vec<&str> = nodes.iter().map(|n| n.alias.as_str()).collect();
    aliases.join(separator.as_str())
}

/// Zero-based depth of a path: the number of separators in it.
pub fn path_depth(path: &str) -> usize {
    path.matches(PATH_SEPARATOR).count()
}
