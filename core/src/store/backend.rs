//! Durable key-value storage behind the settings store.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use super::Result;

/// One stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum SettingValue {
    Str(String),
    Int(i32),
    Long(i64),
}

/// One change in a batch applied through [`KeyValueBackend::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Put(String, SettingValue),
    Remove(String),
}

impl Edit {
    pub fn put(key: impl Into<String>, value: SettingValue) -> Self {
        Self::Put(key.into(), value)
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove(key.into())
    }
}

/// Durable key-value storage that survives process restarts.
pub trait KeyValueBackend: Send + Sync + std::fmt::Debug {
    fn load(&self, key: &str) -> Result<Option<SettingValue>>;

    /// Apply every edit in `edits` together.
    fn apply(&self, edits: &[Edit]) -> Result<()>;
}

type SettingsMap = BTreeMap<String, SettingValue>;

fn apply_edits(map: &mut SettingsMap, edits: &[Edit]) {
    for edit in edits {
        match edit {
            Edit::Put(key, value) => {
                map.insert(key.clone(), value.clone());
            }
            Edit::Remove(key) => {
                map.remove(key);
            }
        }
    }
}

/// Volatile backend, mainly for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<SettingsMap>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<SettingValue>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn apply(&self, edits: &[Edit]) -> Result<()> {
        apply_edits(&mut self.entries.lock(), edits);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    entries: SettingsMap,
}

/// Backend storing every setting in one JSON file, replaced atomically on each write.
///
/// The file is created lazily on the first write. A file that cannot be parsed is logged and
/// treated as empty; the next write replaces it.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<SettingsFile> {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(file) => Ok(file),
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "settings file is corrupt");
                    Ok(SettingsFile::default())
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(SettingsFile::default()),
            Err(err) => {
                Err(err).with_context(|| format!("reading settings at {}", self.path.display()))
            }
        }
    }

    fn write_file(&self, file: &SettingsFile) -> Result<()> {
        let Some(parent) = self.path.parent() else {
            return Err(anyhow!(
                "settings path {} does not have a parent directory",
                self.path.display()
            ));
        };

        fs::create_dir_all(parent)
            .with_context(|| format!("creating settings directory at {}", parent.display()))?;
        let data = serde_json::to_vec_pretty(file)?;
        let mut temp = NamedTempFile::new_in(parent)
            .with_context(|| format!("allocating temp file in {}", parent.display()))?;
        temp.write_all(&data)?;
        temp.flush()?;

        match temp.persist(&self.path) {
            Ok(_) => Ok(()),
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                if let Err(remove_err) = fs::remove_file(&self.path) {
                    if remove_err.kind() != io::ErrorKind::NotFound {
                        return Err(remove_err.into());
                    }
                }
                err.file.persist(&self.path).map(|_| ()).map_err(|persist| persist.error.into())
            }
            Err(err) => Err(err.error.into()),
        }
    }
}

impl KeyValueBackend for JsonFileBackend {
    fn load(&self, key: &str) -> Result<Option<SettingValue>> {
        let _guard = self.lock.lock();
        let file = self.read_file()?;
        Ok(file.entries.get(key).cloned())
    }

    fn apply(&self, edits: &[Edit]) -> Result<()> {
        let _guard = self.lock.lock();
        let mut file = self.read_file()?;
        apply_edits(&mut file.entries, edits);
        self.write_file(&file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_is_created_lazily() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let backend = JsonFileBackend::new(dir.path().join("state").join("settings.json"));

        assert_eq!(backend.load("missing")?, None);
        assert!(!backend.path().exists());

        backend.apply(&[Edit::put("interval", SettingValue::Int(5))])?;
        assert!(backend.path().exists());
        assert_eq!(backend.load("interval")?, Some(SettingValue::Int(5)));
        Ok(())
    }

    #[test]
    fn values_survive_reopening() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");

        JsonFileBackend::new(&path).apply(&[
            Edit::put("name", SettingValue::Str("Photos".into())),
            Edit::put("position", SettingValue::Long(i64::MAX)),
        ])?;

        let reopened = JsonFileBackend::new(&path);
        assert_eq!(reopened.load("name")?, Some(SettingValue::Str("Photos".into())));
        assert_eq!(reopened.load("position")?, Some(SettingValue::Long(i64::MAX)));

        reopened.apply(&[Edit::remove("name")])?;
        assert_eq!(JsonFileBackend::new(&path).load("name")?, None);
        Ok(())
    }

    #[test]
    fn corrupt_file_reads_as_empty_and_is_replaced() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");
        fs::write(&path, b"{ not json")?;

        let backend = JsonFileBackend::new(&path);
        assert_eq!(backend.load("anything")?, None);

        backend.apply(&[Edit::put("interval", SettingValue::Int(4))])?;
        assert_eq!(backend.load("interval")?, Some(SettingValue::Int(4)));
        Ok(())
    }

    #[test]
    fn edits_apply_in_order() -> Result<()> {
        let backend = MemoryBackend::new();
        backend.apply(&[
            Edit::put("a", SettingValue::Int(1)),
            Edit::remove("a"),
            Edit::put("b", SettingValue::Int(2)),
        ])?;
        assert_eq!(backend.load("a")?, None);
        assert_eq!(backend.load("b")?, Some(SettingValue::Int(2)));
        assert_eq!(backend.len(), 1);
        Ok(())
    }
}
