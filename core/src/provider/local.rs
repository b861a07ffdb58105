//! Directory-backed provider exposing a folder on disk as a document tree.
//!
//! Document ids are `/`-separated paths relative to the base directory, with `.` naming the
//! base itself. Children are only listed under trees holding a read grant. Grants live in memory
//! unless a grants file is configured, in which case the granted tree ids are persisted as JSON
//! so they survive restarts.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::tree::classify::DIRECTORY_MIME_TYPE;
use crate::tree::resolver::{document_id_of, scope_of};
use crate::types::{Node, QueryKey, TreeScope};

use super::{ChildRow, DocumentProvider, Grant, MetadataRow, ProviderError, RowCursor};

/// Authority reported for every node handed out by [`LocalProvider`].
pub const LOCAL_AUTHORITY: &str = "local";

/// Document id of the base directory.
pub const BASE_DOCUMENT_ID: &str = ".";

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Extension (lowercase, without the dot) to MIME type for the media the gallery shows.
const MIME_TABLE: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("heic", "image/heic"),
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
    ("3gp", "video/3gpp"),
];

/// Provider listing real directories below `base`.
#[derive(Debug)]
pub struct LocalProvider {
    base: PathBuf,
    grants_file: Option<PathBuf>,
    grants: Mutex<HashMap<String, Grant>>,
}

impl LocalProvider {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into(), grants_file: None, grants: Mutex::new(HashMap::new()) }
    }

    /// Persist granted tree ids to `path`, loading any grants recorded there earlier.
    pub fn with_grants_file(mut self, path: impl Into<PathBuf>) -> crate::Result<Self> {
        let path = path.into();
        let ids: Vec<String> = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "grants file is corrupt, ignoring it");
                Vec::new()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("reading grants file {}", path.display()));
            }
        };

        {
            let mut grants = self.grants.lock();
            for id in ids {
                let scope = TreeScope::new(LOCAL_AUTHORITY, id.clone());
                grants.insert(id, Grant { scope, read: true, write: true });
            }
        }
        self.grants_file = Some(path);
        Ok(self)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Tree-root node for the folder at `relative` below the base directory.
    pub fn tree_node(&self, relative: &str) -> Node {
        Node::tree_root(LOCAL_AUTHORITY, normalize_id(relative))
    }

    fn resolve(&self, document_id: &str) -> Result<PathBuf, ProviderError> {
        if document_id == BASE_DOCUMENT_ID {
            return Ok(self.base.clone());
        }
        sanitize_relative(Path::new(document_id))
            .map(|relative| self.base.join(relative))
            .ok_or_else(|| ProviderError::Malformed(format!("invalid document id {document_id:?}")))
    }

    fn check_authority(&self, node_authority: &str, what: &str) -> Result<(), ProviderError> {
        if node_authority == LOCAL_AUTHORITY {
            Ok(())
        } else {
            Err(ProviderError::NotFound(what.to_string()))
        }
    }

    fn can_read(&self, tree_id: &str) -> bool {
        self.grants.lock().get(tree_id).is_some_and(|grant| grant.read)
    }

    fn persist_grants(&self, grants: &HashMap<String, Grant>) -> crate::Result<()> {
        let Some(path) = self.grants_file.as_ref() else {
            return Ok(());
        };
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("grants path {} has no parent directory", path.display()))?;
        fs::create_dir_all(parent)?;

        let mut ids: Vec<&String> = grants.keys().collect();
        ids.sort();
        let data = serde_json::to_vec_pretty(&ids)?;
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(&data)?;
        temp.flush()?;
        temp.persist(path).map_err(|err| anyhow::Error::from(err.error))?;
        Ok(())
    }
}

impl DocumentProvider for LocalProvider {
    fn grant_persistent_access(&self, node: &Node) -> Result<(), ProviderError> {
        self.check_authority(node.authority(), &node.to_string())?;
        let scope = scope_of(node);
        let path = self.resolve(scope.tree_id.as_str())?;
        if !path.is_dir() {
            return Err(ProviderError::NotFound(node.to_string()));
        }

        let mut grants = self.grants.lock();
        grants.insert(scope.tree_id.as_str().to_string(), Grant { scope, read: true, write: true });
        if let Err(err) = self.persist_grants(&grants) {
            warn!(error = %format!("{err:#}"), "failed to persist local grants");
        }
        Ok(())
    }

    fn persisted_grants(&self) -> Vec<Grant> {
        self.grants.lock().values().cloned().collect()
    }

    fn query_children(&self, key: &QueryKey) -> Result<Option<RowCursor>, ProviderError> {
        self.check_authority(&key.scope.authority, &key.to_string())?;
        if !self.can_read(key.scope.tree_id.as_str()) {
            return Err(ProviderError::PermissionDenied(key.to_string()));
        }
        if !is_within(key.parent.as_str(), key.scope.tree_id.as_str()) {
            return Err(ProviderError::PermissionDenied(key.to_string()));
        }

        let dir = self.resolve(key.parent.as_str())?;
        let read_dir = fs::read_dir(&dir).map_err(|err| map_io(err, &dir))?;
        let parent = key.parent.as_str().to_string();

        let mut rows = Vec::new();
        for entry in read_dir {
            let row = entry.map_err(ProviderError::from).and_then(|entry| {
                let name = entry.file_name().to_str().map(str::to_string).ok_or_else(|| {
                    ProviderError::Malformed(format!("non UTF-8 name in {}", dir.display()))
                })?;
                let file_type = entry.file_type()?;
                let mime_type = if file_type.is_dir() {
                    DIRECTORY_MIME_TYPE.to_string()
                } else {
                    mime_for(Path::new(&name)).to_string()
                };
                Ok((name, mime_type))
            });

            match row {
                Ok((name, _)) if is_hidden(Path::new(&name)) => continue,
                Ok((name, mime_type)) => {
                    let document_id = child_id(&parent, &name);
                    rows.push(Ok(ChildRow::new(name, mime_type, document_id)));
                }
                Err(err) => rows.push(Err(err)),
            }
        }

        debug!(dir = %dir.display(), rows = rows.len(), "listed local directory");
        Ok(Some(RowCursor::new(rows)))
    }

    fn query_metadata(&self, node: &Node) -> Result<Option<MetadataRow>, ProviderError> {
        if node.authority() != LOCAL_AUTHORITY {
            return Ok(None);
        }
        let path = self.resolve(document_id_of(node).as_str())?;
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let display_name = path
            .canonicalize()
            .unwrap_or_else(|_| path.clone())
            .file_name()
            .and_then(OsStr::to_str)
            .map(str::to_string);
        let mime_type =
            if meta.is_dir() { DIRECTORY_MIME_TYPE } else { mime_for(&path) }.to_string();
        Ok(Some(MetadataRow { display_name, mime_type: Some(mime_type) }))
    }

    fn delete_node(&self, node: &Node) -> Result<bool, ProviderError> {
        self.check_authority(node.authority(), &node.to_string())?;
        let document_id = document_id_of(node);
        if document_id.as_str() == BASE_DOCUMENT_ID {
            return Ok(false);
        }

        let path = self.resolve(document_id.as_str())?;
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(map_io(err, &path)),
        };
        let removed =
            if meta.is_dir() { fs::remove_dir_all(&path) } else { fs::remove_file(&path) };
        removed.map_err(|err| map_io(err, &path))?;
        Ok(true)
    }
}

fn map_io(err: io::Error, path: &Path) -> ProviderError {
    match err.kind() {
        io::ErrorKind::NotFound => ProviderError::NotFound(path.display().to_string()),
        io::ErrorKind::PermissionDenied => {
            ProviderError::PermissionDenied(path.display().to_string())
        }
        _ => ProviderError::Io(err),
    }
}

fn normalize_id(relative: &str) -> String {
    let trimmed = relative.trim_matches('/');
    if trimmed.is_empty() { BASE_DOCUMENT_ID.to_string() } else { trimmed.to_string() }
}

fn child_id(parent: &str, name: &str) -> String {
    if parent == BASE_DOCUMENT_ID { name.to_string() } else { format!("{parent}/{name}") }
}

fn is_within(document_id: &str, tree_id: &str) -> bool {
    tree_id == BASE_DOCUMENT_ID
        || document_id == tree_id
        || document_id.strip_prefix(tree_id).is_some_and(|rest| rest.starts_with('/'))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name().and_then(OsStr::to_str).map(|name| name.starts_with('.')).unwrap_or(false)
}

fn mime_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.to_ascii_lowercase())
        .and_then(|ext| MIME_TABLE.iter().find(|(known, _)| *known == ext).map(|(_, mime)| *mime))
        .unwrap_or(FALLBACK_MIME_TYPE)
}

fn sanitize_relative(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) | Component::RootDir => return None,
        }
    }

    if clean.as_os_str().is_empty() { None } else { Some(clean) }
}
