//! Orchestration of grants, navigation, listings, and settings for the gallery UI.
//!
//! [`GalleryController`] owns the navigation stack and the current listing as one explicit value.
//! Every navigation or mutation rebuilds the listing from the provider; nothing is patched
//! locally. Listings are tagged with a [`RequestToken`] so that a slow enumeration finishing
//! after a newer navigation is discarded instead of applied.

pub mod state;
pub mod worker;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::nav::NavigationStack;
use crate::permission::PermissionLedger;
use crate::provider::DocumentProvider;
use crate::store::{SettingsStore, clamp_slideshow_interval};
use crate::tree::{DirectoryEnumerator, TreeResolver};
use crate::types::{Entry, Kind, Listing, Node, RequestToken};

pub use state::{GalleryState, NO_SELECTION_PATH, Slideshow, ViewerContext};
pub use worker::GalleryWorker;

type Observer = Box<dyn Fn(&GalleryState) + Send + Sync>;

/// A listing the controller is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub token: RequestToken,
    pub node: Node,
}

pub struct GalleryController {
    provider: Arc<dyn DocumentProvider>,
    resolver: TreeResolver,
    enumerator: DirectoryEnumerator,
    ledger: PermissionLedger,
    settings: SettingsStore,
    stack: NavigationStack,
    listing: Listing,
    latest: u64,
    observers: Vec<Observer>,
}

impl std::fmt::Debug for GalleryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryController")
            .field("stack", &self.stack)
            .field("entries", &self.listing.len())
            .field("latest", &self.latest)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl GalleryController {
    pub fn new(provider: Arc<dyn DocumentProvider>, settings: SettingsStore) -> Self {
        Self {
            resolver: TreeResolver::new(Arc::clone(&provider)),
            enumerator: DirectoryEnumerator::new(Arc::clone(&provider)),
            ledger: PermissionLedger::new(Arc::clone(&provider)),
            provider,
            settings,
            stack: NavigationStack::new(),
            listing: Listing::default(),
            latest: 0,
            observers: Vec::new(),
        }
    }

    /// Register a callback receiving the state after every completed operation.
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&GalleryState) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Open the saved default folder if it is still usable; otherwise forget it.
    ///
    /// Returns whether a folder was opened. There is no retry beyond this single check.
    pub fn start(&mut self) -> bool {
        let Some(default) = self.settings.default_root() else {
            debug!("no default folder configured");
            return false;
        };

        if !self.ledger.is_usable(&default.node) {
            warn!(node = %default.node, "default folder is no longer accessible, clearing it");
            self.settings.clear_default_root();
            self.deselect();
            return false;
        }

        let name = default.name.unwrap_or_else(|| self.resolver.display_name(&default.node));
        info!(node = %default.node, name = %name, "opening default folder");
        self.stack.select_root(default.node, name);
        self.refresh();
        true
    }

    /// Re-run the startup check, but only while no folder is selected.
    pub fn reload_default_if_unselected(&mut self) -> bool {
        if self.stack.is_empty() { self.start() } else { false }
    }

    /// Make `node` the browsing root. Does not touch the saved default folder.
    pub fn select_folder(&mut self, node: Node) {
        self.ledger.grant(&node);
        let name = self.resolver.display_name(&node);
        debug!(node = %node, name = %name, "folder selected");
        self.stack.select_root(node, name);
        self.refresh();
    }

    /// Save `node` as the launch folder. Returns the display name that was stored.
    pub fn set_default_folder(&mut self, node: &Node) -> String {
        self.ledger.grant(node);
        let name = self.resolver.display_name(node);
        self.settings.set_default_root(node, &name);
        name
    }

    pub fn clear_default_folder(&mut self) {
        self.settings.clear_default_root();
    }

    /// Descend into a folder entry. Non-folders and an unselected stack are ignored.
    pub fn navigate_into(&mut self, entry: &Entry) -> bool {
        if !self.stack.push(entry) {
            debug!(name = %entry.display_name, kind = ?entry.kind, "ignored navigation request");
            return false;
        }
        debug!(node = %entry.node, "navigated into folder");
        self.refresh();
        true
    }

    /// Return to the parent folder. A no-op at the root.
    pub fn navigate_back(&mut self) -> bool {
        let Some(frame) = self.stack.pop() else {
            debug!("already at the root folder");
            return false;
        };
        debug!(left = %frame.display_name, "navigated back");
        self.refresh();
        true
    }

    /// Delete `entry` through the provider and rebuild the listing on success.
    ///
    /// On failure the listing is left exactly as it was.
    pub fn delete_entry(&mut self, entry: &Entry) -> bool {
        match self.provider.delete_node(&entry.node) {
            Ok(true) => {
                info!(name = %entry.display_name, "deleted entry");
                self.refresh();
                true
            }
            Ok(false) => {
                warn!(name = %entry.display_name, "provider refused to delete entry");
                false
            }
            Err(err) => {
                warn!(name = %entry.display_name, error = %err, "failed to delete entry");
                false
            }
        }
    }

    /// Rebuild the listing of the current folder.
    pub fn refresh(&mut self) {
        match self.begin_refresh() {
            Some(request) => {
                let listing = self.enumerator.list(&request.node);
                self.apply_listing(request, listing);
            }
            None => self.deselect(),
        }
    }

    /// Start a listing of the current folder, superseding any request still in flight.
    ///
    /// Embedders that enumerate off the calling thread list `request.node` themselves and hand
    /// the result to [`GalleryController::apply_listing`].
    pub fn begin_refresh(&mut self) -> Option<ListingRequest> {
        let node = self.stack.current()?.clone();
        Some(ListingRequest { token: self.next_token(), node })
    }

    /// Apply a finished listing. Returns `false` and discards it if a newer request was issued.
    pub fn apply_listing(&mut self, request: ListingRequest, listing: Listing) -> bool {
        if request.token.as_u64() != self.latest || self.stack.current() != Some(&request.node) {
            debug!(
                token = request.token.as_u64(),
                latest = self.latest,
                "discarding stale listing"
            );
            return false;
        }
        self.listing = listing;
        self.publish();
        true
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn can_go_back(&self) -> bool {
        self.stack.can_go_back()
    }

    pub fn stack(&self) -> &NavigationStack {
        &self.stack
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn enumerator(&self) -> &DirectoryEnumerator {
        &self.enumerator
    }

    /// Name of the current folder, or [`NO_SELECTION_PATH`] when nothing is selected.
    pub fn current_path(&self) -> &str {
        self.stack
            .current_frame()
            .map(|frame| frame.display_name.as_str())
            .unwrap_or(NO_SELECTION_PATH)
    }

    pub fn state(&self) -> GalleryState {
        GalleryState {
            navigation: self.stack.state(),
            frames: self.stack.frames().to_vec(),
            listing: self.listing.clone(),
            can_go_back: self.can_go_back(),
            current_path: self.current_path().to_string(),
        }
    }

    /// Images of the current listing with the saved interval, or `None` when there are none.
    pub fn slideshow(&self) -> Option<Slideshow> {
        let images: Vec<Entry> = self.listing.images().cloned().collect();
        if images.is_empty() {
            return None;
        }
        Some(Slideshow {
            images,
            interval_secs: clamp_slideshow_interval(self.settings.slideshow_interval()),
        })
    }

    /// The image sequence for viewing `entry`. `None` unless `entry` is a listed image.
    pub fn viewer(&self, entry: &Entry) -> Option<ViewerContext> {
        if entry.kind != Kind::Image {
            return None;
        }
        let images: Vec<Entry> = self.listing.images().cloned().collect();
        let index = images.iter().position(|image| image.node == entry.node)?;
        Some(ViewerContext { images, index })
    }

    pub fn playback_position(&self, entry: &Entry) -> u64 {
        self.settings.playback_position(&entry.node)
    }

    pub fn save_playback_position(&self, entry: &Entry, position_ms: u64) {
        self.settings.set_playback_position(&entry.node, position_ms);
    }

    fn deselect(&mut self) {
        self.next_token();
        self.stack.clear();
        self.listing = Listing::default();
        self.publish();
    }

    fn next_token(&mut self) -> RequestToken {
        self.latest = self.latest.wrapping_add(1).max(1);
        RequestToken::new(self.latest)
    }

    fn publish(&self) {
        if self.observers.is_empty() {
            return;
        }
        let state = self.state();
        for observer in &self.observers {
            observer(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use crate::provider::memory::{DeleteFault, QueryFault};
    use crate::store::{Edit, KeyValueBackend, MemoryBackend, SettingValue};
    use parking_lot::Mutex;

    fn gallery() -> (Arc<MemoryProvider>, GalleryController, Node) {
        let provider = Arc::new(MemoryProvider::new("memory"));
        let root = provider.add_root("root", "Photos");
        provider.add_folder("root", "trip", "Trip");
        provider.add_file("root", "cover.jpg", "cover.jpg", "image/jpeg");
        provider.add_file("trip", "trip/beach.jpg", "beach.jpg", "image/jpeg");
        provider.add_file("trip", "trip/clip.mp4", "clip.mp4", "video/mp4");

        let settings = SettingsStore::new(Arc::new(MemoryBackend::new()));
        let controller = GalleryController::new(provider.clone(), settings);
        (provider, controller, root)
    }

    fn names(controller: &GalleryController) -> Vec<String> {
        controller.listing().iter().map(|entry| entry.display_name.clone()).collect()
    }

    #[test]
    fn starts_unselected_without_default() {
        let (_provider, mut controller, _root) = gallery();
        assert!(!controller.start());
        assert!(controller.listing().is_empty());
        assert_eq!(controller.current_path(), NO_SELECTION_PATH);
        assert!(!controller.can_go_back());
    }

    #[test]
    fn select_and_navigate() {
        let (_provider, mut controller, root) = gallery();
        controller.select_folder(root.clone());
        assert_eq!(names(&controller), vec!["Trip", "cover.jpg"]);
        assert_eq!(controller.current_path(), "Photos");

        let trip = controller.listing().entries[0].clone();
        assert!(controller.navigate_into(&trip));
        assert_eq!(names(&controller), vec!["beach.jpg", "clip.mp4"]);
        assert!(controller.can_go_back());
        assert_eq!(controller.current_path(), "Trip");

        assert!(controller.navigate_back());
        assert_eq!(names(&controller), vec!["Trip", "cover.jpg"]);
        assert!(!controller.can_go_back());
        assert!(!controller.navigate_back());
        assert_eq!(controller.listing().node.as_ref(), Some(&root));
    }

    #[test]
    fn selecting_a_folder_does_not_save_a_default() {
        let (_provider, mut controller, root) = gallery();
        controller.select_folder(root);
        assert!(!controller.settings().has_default_root());
    }

    #[test]
    fn navigating_into_a_file_is_ignored() {
        let (_provider, mut controller, root) = gallery();
        controller.select_folder(root);
        let before = controller.state();
        let cover = controller.listing().entries[1].clone();
        assert!(!controller.navigate_into(&cover));
        assert_eq!(controller.state(), before);
    }

    #[test]
    fn start_restores_usable_default() {
        let (provider, mut controller, root) = gallery();
        provider.grant("root");
        controller.settings().set_default_root(&root, "Saved");

        assert!(controller.start());
        assert_eq!(controller.current_path(), "Saved");
        assert_eq!(names(&controller), vec!["Trip", "cover.jpg"]);
    }

    #[test]
    fn set_default_folder_stores_resolved_name() {
        let (_provider, mut controller, root) = gallery();
        assert_eq!(controller.set_default_folder(&root), "Photos");
        assert_eq!(controller.settings().default_root_name().as_deref(), Some("Photos"));

        assert!(controller.start());
        assert_eq!(controller.current_path(), "Photos");

        controller.clear_default_folder();
        assert!(!controller.settings().has_default_root());
    }

    #[test]
    fn start_resolves_missing_default_name() {
        let (provider, _controller, root) = gallery();
        provider.grant("root");
        let backend = Arc::new(MemoryBackend::new());
        backend
            .apply(&[Edit::put("default_folder_uri", SettingValue::Str(root.to_string()))])
            .unwrap();
        let mut controller = GalleryController::new(provider, SettingsStore::new(backend));

        assert!(controller.start());
        assert_eq!(controller.current_path(), "Photos");
    }

    #[test]
    fn start_clears_revoked_default() {
        let (_provider, mut controller, root) = gallery();
        controller.settings().set_default_root(&root, "Saved");

        assert!(!controller.start());
        assert!(!controller.settings().has_default_root());
        assert!(controller.stack().is_empty());
        assert!(controller.listing().is_empty());
    }

    #[test]
    fn reload_only_when_unselected() {
        let (provider, mut controller, root) = gallery();
        provider.grant("root");
        assert!(!controller.reload_default_if_unselected());

        controller.settings().set_default_root(&root, "Saved");
        assert!(controller.reload_default_if_unselected());
        assert!(!controller.reload_default_if_unselected());
    }

    #[test]
    fn delete_rebuilds_listing() {
        let (provider, mut controller, root) = gallery();
        controller.select_folder(root);
        let cover = controller.listing().entries[1].clone();

        assert!(controller.delete_entry(&cover));
        assert_eq!(names(&controller), vec!["Trip"]);
        assert!(!provider.contains("cover.jpg"));
    }

    #[test]
    fn failed_delete_leaves_listing_untouched() {
        let (provider, mut controller, root) = gallery();
        controller.select_folder(root);
        let before = controller.listing().clone();
        let cover = before.entries[1].clone();

        for fault in [DeleteFault::Refuse, DeleteFault::Error] {
            provider.set_delete_fault(Some(fault));
            assert!(!controller.delete_entry(&cover));
            assert_eq!(controller.listing(), &before);
        }
    }

    #[test]
    fn failing_listing_degrades_to_empty() {
        let (provider, mut controller, root) = gallery();
        controller.select_folder(root);
        provider.set_query_fault(Some(QueryFault::Io));
        controller.refresh();
        assert!(controller.listing().is_empty());
        assert_eq!(controller.current_path(), "Photos");
    }

    #[test]
    fn stale_listing_is_discarded() {
        let (_provider, mut controller, root) = gallery();
        controller.select_folder(root);
        let trip = controller.listing().entries[0].clone();

        let stale = controller.begin_refresh().expect("root selected");
        let stale_listing = controller.enumerator().list(&stale.node);
        assert!(controller.navigate_into(&trip));

        assert!(!controller.apply_listing(stale, stale_listing));
        assert_eq!(names(&controller), vec!["beach.jpg", "clip.mp4"]);
    }

    #[test]
    fn observers_see_each_completed_operation() {
        let (_provider, mut controller, root) = gallery();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        controller.subscribe(move |state| sink.lock().push(state.current_path.clone()));

        controller.select_folder(root);
        let trip = controller.listing().entries[0].clone();
        controller.navigate_into(&trip);
        controller.navigate_back();

        assert_eq!(*seen.lock(), vec!["Photos", "Trip", "Photos"]);
    }

    #[test]
    fn slideshow_and_viewer_use_images_only() {
        let (_provider, mut controller, root) = gallery();
        controller.settings().set_slideshow_interval(25);
        controller.select_folder(root);

        let show = controller.slideshow().expect("one image");
        assert_eq!(show.images.len(), 1);
        assert_eq!(show.interval_secs, 10);

        let cover = controller.listing().entries[1].clone();
        let viewer = controller.viewer(&cover).expect("cover is an image");
        assert_eq!(viewer.index, 0);

        let trip = controller.listing().entries[0].clone();
        assert!(controller.viewer(&trip).is_none());
        controller.navigate_into(&trip);
        let clip = controller.listing().entries[1].clone();
        assert!(controller.viewer(&clip).is_none());
    }

    #[test]
    fn playback_positions_follow_entries() {
        let (_provider, mut controller, root) = gallery();
        controller.select_folder(root);
        let trip = controller.listing().entries[0].clone();
        controller.navigate_into(&trip);
        let clip = controller.listing().entries[1].clone();

        assert_eq!(controller.playback_position(&clip), 0);
        controller.save_playback_position(&clip, 15_000);
        assert_eq!(controller.playback_position(&clip), 15_000);
    }
}
