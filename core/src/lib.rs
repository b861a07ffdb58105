//! Core library for browsing media in provider-backed document trees.

#![deny(missing_debug_implementations)]

pub mod config;
pub mod controller;
pub mod log;
pub mod nav;
pub mod permission;
pub mod provider;
pub mod store;
pub mod tree;
pub mod types;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

pub use config::GalleryConfig;
pub use controller::{GalleryController, GalleryState, GalleryWorker, ListingRequest};
pub use nav::{NavigationStack, NavigationState};
pub use permission::PermissionLedger;
pub use provider::{DocumentProvider, LocalProvider, MemoryProvider, ProviderError};
pub use store::{SettingsStore, clamp_slideshow_interval};
pub use tree::{DirectoryEnumerator, TreeResolver, classify};
pub use types::{
    DocumentId, Entry, Kind, Listing, NavigationFrame, Node, NodeParseError, QueryKey,
    RequestToken, TreeScope,
};

/// Returns the version of the core crate for telemetry and debugging.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
