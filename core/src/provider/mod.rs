//! Host-side collaborators: the document tree the core browses without owning it.
//!
//! The core never touches storage directly. Everything it knows about folders, grants, and
//! deletions flows through a [`DocumentProvider`]. Two implementations ship with the crate:
//! [`MemoryProvider`] for tests and embedders that manage their own tree, and [`LocalProvider`]
//! which exposes a directory on disk through the same document-tree contract.

pub mod local;
pub mod memory;

use std::fmt;

use thiserror::Error;

use crate::types::{Node, QueryKey, TreeScope};

pub use local::LocalProvider;
pub use memory::MemoryProvider;

/// Failure reported by a provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("permission denied for {0}")]
    PermissionDenied(String),
    #[error("document {0} not found")]
    NotFound(String),
    #[error("malformed document data: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Durable access grant recorded by the host for one tree scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grant {
    pub scope: TreeScope,
    pub read: bool,
    pub write: bool,
}

/// One raw row returned by a children query. Columns the provider does not report are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildRow {
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    pub document_id: Option<String>,
}

impl ChildRow {
    pub fn new(
        display_name: impl Into<String>,
        mime_type: impl Into<String>,
        document_id: impl Into<String>,
    ) -> Self {
        Self {
            display_name: Some(display_name.into()),
            mime_type: Some(mime_type.into()),
            document_id: Some(document_id.into()),
        }
    }
}

/// Single descriptive row for one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRow {
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
}

/// Rows produced by a children query. Reading an individual row may fail.
pub struct RowCursor {
    rows: Box<dyn Iterator<Item = Result<ChildRow, ProviderError>> + Send>,
}

impl RowCursor {
    pub fn new<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Result<ChildRow, ProviderError>>,
        I::IntoIter: Send + 'static,
    {
        Self { rows: Box::new(rows.into_iter()) }
    }

    pub fn from_rows(rows: Vec<ChildRow>) -> Self {
        Self::new(rows.into_iter().map(Ok))
    }
}

impl Iterator for RowCursor {
    type Item = Result<ChildRow, ProviderError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCursor").finish_non_exhaustive()
    }
}

/// Operations the core consumes from the surrounding environment.
pub trait DocumentProvider: Send + Sync {
    /// Ask the host to remember read/write access to `node` across restarts.
    fn grant_persistent_access(&self, node: &Node) -> Result<(), ProviderError>;

    /// Grants the host currently holds on record.
    fn persisted_grants(&self) -> Vec<Grant>;

    /// List the children addressed by `key`. `Ok(None)` means the host returned no cursor.
    fn query_children(&self, key: &QueryKey) -> Result<Option<RowCursor>, ProviderError>;

    /// Single-row metadata lookup for `node`.
    fn query_metadata(&self, node: &Node) -> Result<Option<MetadataRow>, ProviderError>;

    /// Delete `node`, recursively for folders. Returns whether anything was deleted.
    fn delete_node(&self, node: &Node) -> Result<bool, ProviderError>;
}
