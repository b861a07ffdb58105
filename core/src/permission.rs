//! Durable grant checks for tree roots.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::provider::DocumentProvider;
use crate::tree::resolver::{children_query, scope_of};
use crate::types::Node;

/// Tracks which tree roots hold a durable grant and whether they are still usable.
#[derive(Clone)]
pub struct PermissionLedger {
    provider: Arc<dyn DocumentProvider>,
}

impl std::fmt::Debug for PermissionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionLedger").finish_non_exhaustive()
    }
}

impl PermissionLedger {
    pub fn new(provider: Arc<dyn DocumentProvider>) -> Self {
        Self { provider }
    }

    /// Whether the host has a durable read grant recorded for the tree `node` belongs to.
    pub fn has_grant(&self, node: &Node) -> bool {
        let scope = scope_of(node);
        self.provider.persisted_grants().iter().any(|grant| grant.scope == scope && grant.read)
    }

    /// Probe `node`: it must hold a durable read grant and a trial listing must succeed.
    ///
    /// Never fails; any provider error reads as "not usable".
    pub fn is_usable(&self, node: &Node) -> bool {
        if !self.has_grant(node) {
            warn!(node = %node, "no persisted read grant");
            return false;
        }

        match self.provider.query_children(&children_query(node)) {
            Ok(Some(cursor)) => {
                debug!(node = %node, rows = cursor.count(), "node is accessible");
                true
            }
            Ok(None) => {
                warn!(node = %node, "trial listing returned no cursor");
                false
            }
            Err(err) => {
                warn!(node = %node, error = %err, "trial listing failed");
                false
            }
        }
    }

    /// Ask the host to keep read/write access to `node`. Denials are logged and ignored.
    pub fn grant(&self, node: &Node) -> bool {
        match self.provider.grant_persistent_access(node) {
            Ok(()) => {
                debug!(node = %node, "persistent grant recorded");
                true
            }
            Err(err) => {
                warn!(node = %node, error = %err, "persistent grant was not recorded");
                false
            }
        }
    }
}
