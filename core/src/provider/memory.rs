//! In-memory document tree with grant bookkeeping and fault injection.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::tree::classify::DIRECTORY_MIME_TYPE;
use crate::tree::resolver::{document_id_of, scope_of};
use crate::types::{Node, QueryKey};

use super::{ChildRow, DocumentProvider, Grant, MetadataRow, ProviderError, RowCursor};

/// How children queries should misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFault {
    /// Queries fail with [`ProviderError::PermissionDenied`].
    Denied,
    /// Queries fail with an I/O error.
    Io,
    /// Queries succeed but hand back no cursor.
    NoCursor,
}

/// How deletions should misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteFault {
    /// The provider reports `false`.
    Refuse,
    /// The provider returns an error.
    Error,
}

#[derive(Debug, Clone)]
struct MemoryDocument {
    id: String,
    parent: Option<String>,
    row: ChildRow,
    broken: bool,
}

#[derive(Debug, Default)]
struct MemoryTree {
    documents: Vec<MemoryDocument>,
    grants: HashMap<String, Grant>,
    query_fault: Option<QueryFault>,
    delete_fault: Option<DeleteFault>,
    deny_grants: bool,
}

impl MemoryTree {
    fn find(&self, id: &str) -> Option<&MemoryDocument> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    fn is_within(&self, id: &str, ancestor: &str) -> bool {
        let mut cursor = Some(id.to_string());
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.find(&current).and_then(|doc| doc.parent.clone());
        }
        false
    }
}

/// Document provider keeping its whole tree in memory.
#[derive(Debug)]
pub struct MemoryProvider {
    authority: String,
    tree: RwLock<MemoryTree>,
}

impl MemoryProvider {
    pub fn new(authority: impl Into<String>) -> Self {
        Self { authority: authority.into(), tree: RwLock::new(MemoryTree::default()) }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Add a top-level folder and return the tree-root node addressing it.
    pub fn add_root(&self, id: &str, name: &str) -> Node {
        self.insert(None, ChildRow::new(name, DIRECTORY_MIME_TYPE, id), false);
        Node::tree_root(self.authority.clone(), id)
    }

    pub fn add_folder(&self, parent: &str, id: &str, name: &str) {
        self.insert(Some(parent), ChildRow::new(name, DIRECTORY_MIME_TYPE, id), false);
    }

    pub fn add_file(&self, parent: &str, id: &str, name: &str, mime_type: &str) {
        self.insert(Some(parent), ChildRow::new(name, mime_type, id), false);
    }

    /// Add a raw row whose columns may be missing.
    pub fn add_row(&self, parent: &str, row: ChildRow) {
        self.insert(Some(parent), row, false);
    }

    /// Add a row that fails when read from the cursor.
    pub fn add_broken_row(&self, parent: &str, id: &str) {
        let row = ChildRow { document_id: Some(id.into()), ..Default::default() };
        self.insert(Some(parent), row, true);
    }

    /// Record a read/write grant for `tree_id` as if it survived from an earlier session.
    pub fn grant(&self, tree_id: &str) {
        let scope = scope_of(&Node::tree_root(self.authority.clone(), tree_id));
        self.tree
            .write()
            .grants
            .insert(tree_id.to_string(), Grant { scope, read: true, write: true });
    }

    pub fn revoke(&self, tree_id: &str) {
        self.tree.write().grants.remove(tree_id);
    }

    pub fn set_query_fault(&self, fault: Option<QueryFault>) {
        self.tree.write().query_fault = fault;
    }

    pub fn set_delete_fault(&self, fault: Option<DeleteFault>) {
        self.tree.write().delete_fault = fault;
    }

    pub fn set_deny_grants(&self, deny: bool) {
        self.tree.write().deny_grants = deny;
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tree.read().find(id).is_some()
    }

    fn insert(&self, parent: Option<&str>, row: ChildRow, broken: bool) {
        let id = row.document_id.clone().unwrap_or_default();
        self.tree.write().documents.push(MemoryDocument {
            id,
            parent: parent.map(str::to_string),
            row,
            broken,
        });
    }
}

impl DocumentProvider for MemoryProvider {
    fn grant_persistent_access(&self, node: &Node) -> Result<(), ProviderError> {
        let mut tree = self.tree.write();
        if tree.deny_grants {
            return Err(ProviderError::PermissionDenied(node.to_string()));
        }
        let scope = scope_of(node);
        tree.grants
            .insert(scope.tree_id.as_str().to_string(), Grant { scope, read: true, write: true });
        Ok(())
    }

    fn persisted_grants(&self) -> Vec<Grant> {
        self.tree.read().grants.values().cloned().collect()
    }

    fn query_children(&self, key: &QueryKey) -> Result<Option<RowCursor>, ProviderError> {
        let tree = self.tree.read();
        match tree.query_fault {
            Some(QueryFault::Denied) => {
                return Err(ProviderError::PermissionDenied(key.to_string()));
            }
            Some(QueryFault::Io) => {
                return Err(std::io::Error::other(format!("query failed for {key}")).into());
            }
            Some(QueryFault::NoCursor) => return Ok(None),
            None => {}
        }

        if key.scope.authority != self.authority
            || !tree.grants.get(key.scope.tree_id.as_str()).is_some_and(|grant| grant.read)
        {
            return Err(ProviderError::PermissionDenied(key.to_string()));
        }
        if tree.find(key.parent.as_str()).is_none() {
            return Err(ProviderError::NotFound(key.parent.to_string()));
        }
        if !tree.is_within(key.parent.as_str(), key.scope.tree_id.as_str()) {
            return Err(ProviderError::PermissionDenied(key.to_string()));
        }

        let rows: Vec<Result<ChildRow, ProviderError>> = tree
            .documents
            .iter()
            .filter(|doc| doc.parent.as_deref() == Some(key.parent.as_str()))
            .map(|doc| {
                if doc.broken {
                    Err(ProviderError::Malformed(format!("row {} could not be read", doc.id)))
                } else {
                    Ok(doc.row.clone())
                }
            })
            .collect();
        Ok(Some(RowCursor::new(rows)))
    }

    fn query_metadata(&self, node: &Node) -> Result<Option<MetadataRow>, ProviderError> {
        let tree = self.tree.read();
        if tree.query_fault == Some(QueryFault::Io) {
            return Err(std::io::Error::other(format!("metadata lookup failed for {node}")).into());
        }
        if node.authority() != self.authority {
            return Ok(None);
        }
        Ok(tree.find(document_id_of(node).as_str()).map(|doc| MetadataRow {
            display_name: doc.row.display_name.clone(),
            mime_type: doc.row.mime_type.clone(),
        }))
    }

    fn delete_node(&self, node: &Node) -> Result<bool, ProviderError> {
        let mut tree = self.tree.write();
        match tree.delete_fault {
            Some(DeleteFault::Refuse) => return Ok(false),
            Some(DeleteFault::Error) => {
                return Err(ProviderError::PermissionDenied(node.to_string()));
            }
            None => {}
        }

        let target = document_id_of(node);
        if node.authority() != self.authority || tree.find(target.as_str()).is_none() {
            return Ok(false);
        }

        let doomed: Vec<String> = tree
            .documents
            .iter()
            .filter(|doc| tree.is_within(&doc.id, target.as_str()))
            .map(|doc| doc.id.clone())
            .collect();
        tree.documents.retain(|doc| !doomed.contains(&doc.id));
        Ok(true)
    }
}
