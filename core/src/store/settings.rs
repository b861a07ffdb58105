//! Typed accessors over the persisted settings map.
//!
//! Every accessor is best-effort. Reads fall back to a documented default when a key is
//! absent, unreadable, or holds a value of the wrong type; writes that fail are logged and
//! otherwise ignored, since settings never gate correctness.

use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::tree::resolver::{document_id_of, scope_of};
use crate::types::Node;

use super::backend::{Edit, KeyValueBackend, SettingValue};

const KEY_DEFAULT_ROOT: &str = "default_folder_uri";
const KEY_DEFAULT_ROOT_NAME: &str = "default_folder_name";
const KEY_SLIDESHOW_INTERVAL: &str = "default_slideshow_speed";
const KEY_PLAYBACK_POSITION_PREFIX: &str = "video_position_";

/// Slideshow interval used when none has been saved.
pub const DEFAULT_SLIDESHOW_INTERVAL_SECS: u32 = 3;

/// Interval range offered to users. The store itself does not enforce it.
pub const SLIDESHOW_INTERVAL_RANGE: RangeInclusive<u32> = 1..=10;

/// Clamp a requested interval into [`SLIDESHOW_INTERVAL_RANGE`].
pub fn clamp_slideshow_interval(secs: u32) -> u32 {
    secs.clamp(*SLIDESHOW_INTERVAL_RANGE.start(), *SLIDESHOW_INTERVAL_RANGE.end())
}

/// The folder opened automatically on launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultRoot {
    pub node: Node,
    pub name: Option<String>,
}

/// Settings persisted across sessions.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl SettingsStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { backend }
    }

    pub fn default_root(&self) -> Option<DefaultRoot> {
        let node = self.default_root_node()?;
        Some(DefaultRoot { node, name: self.default_root_name() })
    }

    pub fn default_root_node(&self) -> Option<Node> {
        let raw = self.load_str(KEY_DEFAULT_ROOT)?;
        match raw.parse::<Node>() {
            Ok(node) => Some(node),
            Err(err) => {
                warn!(value = %raw, error = %err, "stored default folder is not a valid node");
                None
            }
        }
    }

    pub fn default_root_name(&self) -> Option<String> {
        self.load_str(KEY_DEFAULT_ROOT_NAME)
    }

    pub fn has_default_root(&self) -> bool {
        self.default_root_node().is_some()
    }

    /// Store `node` and `name` together as the launch folder.
    ///
    /// A node without an authority has no parsable text form and is not stored.
    pub fn set_default_root(&self, node: &Node, name: &str) {
        if node.authority().is_empty() {
            warn!(node = %node, "default folder has no authority, not saved");
            return;
        }
        self.apply(&[
            Edit::put(KEY_DEFAULT_ROOT, SettingValue::Str(node.to_string())),
            Edit::put(KEY_DEFAULT_ROOT_NAME, SettingValue::Str(name.to_string())),
        ]);
        debug!(node = %node, name, "default folder saved");
    }

    pub fn clear_default_root(&self) {
        self.apply(&[Edit::remove(KEY_DEFAULT_ROOT), Edit::remove(KEY_DEFAULT_ROOT_NAME)]);
        debug!("default folder cleared");
    }

    /// Seconds between slideshow images, [`DEFAULT_SLIDESHOW_INTERVAL_SECS`] when unset.
    pub fn slideshow_interval(&self) -> u32 {
        match self.load(KEY_SLIDESHOW_INTERVAL) {
            Some(SettingValue::Int(secs)) => u32::try_from(secs).unwrap_or_else(|_| {
                warn!(secs, "stored slideshow interval is negative");
                DEFAULT_SLIDESHOW_INTERVAL_SECS
            }),
            Some(other) => {
                warn!(value = ?other, "stored slideshow interval has the wrong type");
                DEFAULT_SLIDESHOW_INTERVAL_SECS
            }
            None => DEFAULT_SLIDESHOW_INTERVAL_SECS,
        }
    }

    pub fn set_slideshow_interval(&self, secs: u32) {
        let Ok(value) = i32::try_from(secs) else {
            warn!(secs, "slideshow interval out of range, not saved");
            return;
        };
        self.apply(&[Edit::put(KEY_SLIDESHOW_INTERVAL, SettingValue::Int(value))]);
    }

    /// Saved playback offset for `node` in milliseconds, 0 when none was saved.
    pub fn playback_position(&self, node: &Node) -> u64 {
        match self.load(&playback_key(node)) {
            Some(SettingValue::Long(ms)) => u64::try_from(ms).unwrap_or(0),
            Some(SettingValue::Int(ms)) => u64::try_from(ms).unwrap_or(0),
            Some(SettingValue::Str(_)) => {
                warn!(node = %node, "stored playback position has the wrong type");
                0
            }
            None => 0,
        }
    }

    pub fn set_playback_position(&self, node: &Node, position_ms: u64) {
        let value = i64::try_from(position_ms).unwrap_or(i64::MAX);
        self.apply(&[Edit::put(playback_key(node), SettingValue::Long(value))]);
    }

    fn load(&self, key: &str) -> Option<SettingValue> {
        match self.backend.load(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %format!("{err:#}"), "failed to read setting");
                None
            }
        }
    }

    fn load_str(&self, key: &str) -> Option<String> {
        match self.load(key)? {
            SettingValue::Str(value) => Some(value),
            other => {
                warn!(key, value = ?other, "setting has the wrong type");
                None
            }
        }
    }

    fn apply(&self, edits: &[Edit]) {
        if let Err(err) = self.backend.apply(edits) {
            warn!(error = %format!("{err:#}"), "failed to write settings");
        }
    }
}

/// Settings key holding the playback position for `node`. Equal nodes share one key.
fn playback_key(node: &Node) -> String {
    let canonical = scope_of(node).document(document_id_of(node));
    format!("{KEY_PLAYBACK_POSITION_PREFIX}{canonical}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backend::MemoryBackend;

    fn store() -> (Arc<MemoryBackend>, SettingsStore) {
        let backend = Arc::new(MemoryBackend::new());
        (backend.clone(), SettingsStore::new(backend))
    }

    #[derive(Debug)]
    struct BrokenBackend;

    impl KeyValueBackend for BrokenBackend {
        fn load(&self, _key: &str) -> crate::Result<Option<SettingValue>> {
            Err(anyhow::anyhow!("disk unavailable"))
        }

        fn apply(&self, _edits: &[Edit]) -> crate::Result<()> {
            Err(anyhow::anyhow!("disk unavailable"))
        }
    }

    #[test]
    fn default_root_round_trip() {
        let (_backend, store) = store();
        assert!(store.default_root().is_none());
        assert!(!store.has_default_root());

        let node = Node::tree_root("memory", "primary:DCIM");
        store.set_default_root(&node, "Photos");
        assert_eq!(
            store.default_root(),
            Some(DefaultRoot { node: node.clone(), name: Some("Photos".into()) })
        );

        store.clear_default_root();
        assert!(store.default_root().is_none());
        assert!(store.default_root_name().is_none());
    }

    #[test]
    fn default_root_with_unusual_authority() {
        let (_backend, store) = store();
        let node = Node::tree_root("a/b", "x");
        store.set_default_root(&node, "Shared");
        assert_eq!(store.default_root_node(), Some(node));

        store.set_default_root(&Node::tree_root("", "y"), "Nowhere");
        assert_eq!(store.default_root_name().as_deref(), Some("Shared"));
    }

    #[test]
    fn unparsable_default_root_reads_as_absent() {
        let (backend, store) = store();
        backend
            .apply(&[Edit::put(KEY_DEFAULT_ROOT, SettingValue::Str("not a node".into()))])
            .unwrap();
        assert!(store.default_root().is_none());
    }

    #[test]
    fn slideshow_interval_defaults_and_updates() {
        let (backend, store) = store();
        assert_eq!(store.slideshow_interval(), DEFAULT_SLIDESHOW_INTERVAL_SECS);
        store.set_slideshow_interval(7);
        assert_eq!(store.slideshow_interval(), 7);

        backend.apply(&[Edit::put(KEY_SLIDESHOW_INTERVAL, SettingValue::Int(-2))]).unwrap();
        assert_eq!(store.slideshow_interval(), DEFAULT_SLIDESHOW_INTERVAL_SECS);

        backend
            .apply(&[Edit::put(KEY_SLIDESHOW_INTERVAL, SettingValue::Str("fast".into()))])
            .unwrap();
        assert_eq!(store.slideshow_interval(), DEFAULT_SLIDESHOW_INTERVAL_SECS);
    }

    #[test]
    fn interval_clamp_is_caller_side() {
        let (_backend, store) = store();
        store.set_slideshow_interval(30);
        assert_eq!(store.slideshow_interval(), 30);
        assert_eq!(clamp_slideshow_interval(30), 10);
        assert_eq!(clamp_slideshow_interval(0), 1);
        assert_eq!(clamp_slideshow_interval(5), 5);
    }

    #[test]
    fn playback_positions_are_per_node() {
        let (_backend, store) = store();
        let clip = Node::tree_document("memory", "root", "clip.mp4");
        let other = Node::tree_document("memory", "root", "other.mp4");

        assert_eq!(store.playback_position(&clip), 0);
        store.set_playback_position(&clip, 15_000);
        assert_eq!(store.playback_position(&clip), 15_000);
        assert_eq!(store.playback_position(&other), 0);
    }

    #[test]
    fn equal_nodes_share_a_playback_position() {
        let (_backend, store) = store();
        let bare = Node::document("media", "clip");
        let root = Node::tree_root("media", "clip");
        let scoped = Node::tree_document("media", "clip", "clip");
        assert_eq!(bare, root);

        store.set_playback_position(&bare, 15_000);
        assert_eq!(store.playback_position(&root), 15_000);
        assert_eq!(store.playback_position(&scoped), 15_000);
        assert_eq!(store.playback_position(&Node::tree_document("media", "other", "clip")), 0);
    }

    #[test]
    fn broken_backend_falls_back_to_defaults() {
        let store = SettingsStore::new(Arc::new(BrokenBackend));
        let node = Node::tree_root("memory", "root");

        store.set_default_root(&node, "Photos");
        store.set_slideshow_interval(9);
        store.set_playback_position(&node, 10);

        assert!(store.default_root().is_none());
        assert_eq!(store.slideshow_interval(), DEFAULT_SLIDESHOW_INTERVAL_SECS);
        assert_eq!(store.playback_position(&node), 0);
    }
}
