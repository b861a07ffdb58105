//! Back-stack of visited folders.

use serde::{Deserialize, Serialize};

use crate::types::{Entry, NavigationFrame, Node};

/// Coarse state of a [`NavigationStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationState {
    /// No root chosen yet.
    Uninitialized,
    /// Exactly one frame: the selected root.
    Rooted,
    /// The root plus at least one nested folder.
    Nested,
}

/// Ordered sequence of visited folders. The first frame is the selected root and is never popped.
///
/// The stack is pure navigation state; it never caches listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavigationStack {
    frames: Vec<NavigationFrame>,
}

impl NavigationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> NavigationState {
        match self.frames.len() {
            0 => NavigationState::Uninitialized,
            1 => NavigationState::Rooted,
            _ => NavigationState::Nested,
        }
    }

    /// Replace the whole stack with a single root frame.
    pub fn select_root(&mut self, node: Node, display_name: impl Into<String>) {
        self.frames.clear();
        self.frames.push(NavigationFrame::new(node, display_name));
    }

    /// Descend into `entry`. Returns `false`, leaving the stack untouched, when the entry is not
    /// a folder or no root has been selected.
    pub fn push(&mut self, entry: &Entry) -> bool {
        if !entry.is_folder() || self.frames.is_empty() {
            return false;
        }
        self.frames.push(NavigationFrame::new(entry.node.clone(), entry.display_name.clone()));
        true
    }

    /// Drop the last frame. The root frame is never removed; popping it is a no-op.
    pub fn pop(&mut self) -> Option<NavigationFrame> {
        if self.frames.len() > 1 { self.frames.pop() } else { None }
    }

    /// Forget the selected root entirely.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn current(&self) -> Option<&Node> {
        self.current_frame().map(|frame| &frame.node)
    }

    pub fn current_frame(&self) -> Option<&NavigationFrame> {
        self.frames.last()
    }

    pub fn root(&self) -> Option<&NavigationFrame> {
        self.frames.first()
    }

    pub fn can_go_back(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn frames(&self) -> &[NavigationFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
