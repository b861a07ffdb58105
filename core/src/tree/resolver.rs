//! Resolution of node references into tree scopes and children queries.

use std::sync::Arc;

use tracing::warn;

use crate::provider::DocumentProvider;
use crate::types::{DocumentId, Node, QueryKey, TreeScope};

/// Display name used when a node's metadata cannot be read.
pub const FALLBACK_DISPLAY_NAME: &str = "root";

/// Scope the node is reachable through. Bare documents are treated as the root of their own tree.
pub fn scope_of(node: &Node) -> TreeScope {
    let (authority, tree_id, _) = node.identity();
    TreeScope { authority: authority.to_string(), tree_id: tree_id.clone() }
}

/// Document id the node addresses inside its scope.
pub fn document_id_of(node: &Node) -> DocumentId {
    let (_, _, document_id) = node.identity();
    document_id.clone()
}

/// Query key listing the children of `node`.
pub fn children_query(node: &Node) -> QueryKey {
    QueryKey { scope: scope_of(node), parent: document_id_of(node) }
}

/// Node for a child row listed under `key`.
pub fn child_node(key: &QueryKey, document_id: DocumentId) -> Node {
    key.scope.document(document_id)
}

/// Resolves human-readable names for nodes through the provider's metadata lookup.
#[derive(Clone)]
pub struct TreeResolver {
    provider: Arc<dyn DocumentProvider>,
}

impl std::fmt::Debug for TreeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeResolver").finish_non_exhaustive()
    }
}

impl TreeResolver {
    pub fn new(provider: Arc<dyn DocumentProvider>) -> Self {
        Self { provider }
    }

    pub fn children_query(&self, node: &Node) -> QueryKey {
        children_query(node)
    }

    /// Display name for `node`, or [`FALLBACK_DISPLAY_NAME`] when metadata is unavailable.
    pub fn display_name(&self, node: &Node) -> String {
        match self.provider.query_metadata(node) {
            Ok(Some(row)) => {
                row.display_name.unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_string())
            }
            Ok(None) => FALLBACK_DISPLAY_NAME.to_string(),
            Err(err) => {
                warn!(node = %node, error = %err, "metadata lookup failed");
                FALLBACK_DISPLAY_NAME.to_string()
            }
        }
    }
}
