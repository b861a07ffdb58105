//! Persisted state that outlives a session.

pub mod backend;
pub mod settings;

pub use backend::{Edit, JsonFileBackend, KeyValueBackend, MemoryBackend, SettingValue};
pub use settings::{
    DEFAULT_SLIDESHOW_INTERVAL_SECS, DefaultRoot, SLIDESHOW_INTERVAL_RANGE, SettingsStore,
    clamp_slideshow_interval,
};

pub type Result<T> = crate::Result<T>;
