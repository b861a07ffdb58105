//! Snapshot of controller state published to observers.

use serde::{Deserialize, Serialize};

use crate::nav::NavigationState;
use crate::types::{Entry, Listing, NavigationFrame};

/// Label shown as the current path when nothing is selected.
pub const NO_SELECTION_PATH: &str = "/";

/// Everything the UI renders, captured after one completed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryState {
    pub navigation: NavigationState,
    pub frames: Vec<NavigationFrame>,
    pub listing: Listing,
    pub can_go_back: bool,
    pub current_path: String,
}

/// Images handed to the slideshow surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slideshow {
    pub images: Vec<Entry>,
    pub interval_secs: u32,
}

/// Image sequence the viewer can swipe through, starting at `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerContext {
    pub images: Vec<Entry>,
    pub index: usize,
}
