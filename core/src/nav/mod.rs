//! Navigation state for the folder browser.

pub mod stack;

pub use stack::{NavigationStack, NavigationState};
