//! One-shot directory listings built from provider rows.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::provider::{ChildRow, DocumentProvider};
use crate::types::{DocumentId, Entry, Listing, Node, QueryKey};

use super::classify::classify;
use super::resolver::{child_node, children_query};

/// Display name used for rows that do not report one.
pub const UNKNOWN_DISPLAY_NAME: &str = "unknown";

/// Executes listings against a provider. Holds no state between calls.
#[derive(Clone)]
pub struct DirectoryEnumerator {
    provider: Arc<dyn DocumentProvider>,
}

impl std::fmt::Debug for DirectoryEnumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryEnumerator").finish_non_exhaustive()
    }
}

impl DirectoryEnumerator {
    pub fn new(provider: Arc<dyn DocumentProvider>) -> Self {
        Self { provider }
    }

    /// List the classified children of `node`, folders first and then by name.
    ///
    /// Query failures and missing cursors produce an empty listing. Rows that cannot be read or
    /// classified are skipped without aborting the rest of the listing.
    pub fn list(&self, node: &Node) -> Listing {
        let key = children_query(node);
        debug!(query = %key, "listing children");

        let cursor = match self.provider.query_children(&key) {
            Ok(Some(cursor)) => cursor,
            Ok(None) => {
                warn!(query = %key, "children query returned no cursor");
                return Listing::empty(node.clone());
            }
            Err(err) => {
                warn!(query = %key, error = %err, "children query failed");
                return Listing::empty(node.clone());
            }
        };

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for row in cursor {
            match row {
                Ok(row) => match entry_from_row(&key, row) {
                    Some(entry) => entries.push(entry),
                    None => skipped += 1,
                },
                Err(err) => {
                    warn!(query = %key, error = %err, "skipping unreadable row");
                    skipped += 1;
                }
            }
        }

        sort_entries(&mut entries);
        debug!(query = %key, entries = entries.len(), skipped, "listing complete");
        Listing::new(node.clone(), entries)
    }
}

fn entry_from_row(key: &QueryKey, row: ChildRow) -> Option<Entry> {
    let display_name = row.display_name.unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string());
    let kind = classify(&display_name, row.mime_type.as_deref())?;
    let Some(document_id) = row.document_id.filter(|id| !id.is_empty()) else {
        warn!(query = %key, name = %display_name, "row has no document id");
        return None;
    };

    Some(Entry {
        display_name,
        node: child_node(key, DocumentId::new(document_id)),
        kind,
        mime_type: row.mime_type,
    })
}

/// Ordering used for listings: folders before files, then by display name.
pub fn compare_entries(a: &Entry, b: &Entry) -> Ordering {
    b.is_folder().cmp(&a.is_folder()).then_with(|| a.display_name.cmp(&b.display_name))
}

pub fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(compare_entries);
}
