//! Application directories and startup configuration.

use std::path::PathBuf;

use anyhow::anyhow;
use directories::ProjectDirs;

use crate::log::{LogConfig, LogHandle};
use crate::store::JsonFileBackend;

const APP_QUALIFIER: &str = "com";
const APP_ORGANISATION: &str = "Gallery";
pub(crate) const APP_NAME: &str = "gallery";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "GALLERY_DATA_DIR";

const SETTINGS_FILE_NAME: &str = "settings.json";

/// Resolve the platform data directory, honouring [`DATA_DIR_ENV`].
pub fn data_dir() -> crate::Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    ProjectDirs::from(APP_QUALIFIER, APP_ORGANISATION, APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("unable to resolve application data directory"))
}

/// Where the gallery keeps its state and logs.
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    pub data_dir: PathBuf,
    pub settings_file: PathBuf,
    pub log: LogConfig,
}

impl GalleryConfig {
    /// Configuration rooted at the platform data directory.
    pub fn load() -> crate::Result<Self> {
        Ok(Self::with_data_dir(data_dir()?))
    }

    /// Configuration rooted at `data_dir`, keeping settings and logs beneath it.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let settings_file = data_dir.join("state").join(SETTINGS_FILE_NAME);
        let log = LogConfig::new(data_dir.join("logs"));
        Self { data_dir, settings_file, log }
    }

    /// Install process-wide logging into [`LogConfig::directory`]. Only the first call installs.
    pub fn init_logging(&self) -> crate::Result<&'static LogHandle> {
        crate::log::init(self.log.clone())
    }

    /// Settings backend writing to [`GalleryConfig::settings_file`].
    pub fn settings_backend(&self) -> JsonFileBackend {
        JsonFileBackend::new(self.settings_file.clone())
    }
}
