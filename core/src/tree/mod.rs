//! Document-tree access: node resolution, classification, and listings.

pub mod classify;
pub mod enumerate;
pub mod resolver;

pub use classify::{DIRECTORY_MIME_TYPE, classify};
pub use enumerate::{DirectoryEnumerator, compare_entries, sort_entries};
pub use resolver::{TreeResolver, children_query, scope_of};
