//! File-backed store implementation

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{Record, StoreError};

/// A file-per-record JSON store rooted at a single directory
///
/// Each record is written as `<root>/<KIND>/<id>.json`. Saves go through
/// a temp file in the same directory followed by a rename, so readers
/// never observe a half-written document.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        debug!(?root, "FileStore::open: called");
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir<R: Record>(&self) -> PathBuf {
        self.root.join(R::KIND)
    }

    fn record_path<R: Record>(&self, id: &str) -> PathBuf {
        self.kind_dir::<R>().join(format!("{id}.json"))
    }

    /// Persist a record, replacing any previous version (last-write-wins)
    pub fn save<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let id = record.record_id();
        debug!(kind = R::KIND, %id, "FileStore::save: called");

        let dir = self.kind_dir::<R>();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(record).map_err(StoreError::Serialize)?;

        // Write to a temp file in the same directory, then rename into
        // place. Rename is atomic on the same filesystem, so a crash
        // here leaves the previous document intact.
        let path = self.record_path::<R>(&id);
        let tmp = dir.join(format!(".{id}.json.tmp"));
        fs::write(&tmp, json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(kind = R::KIND, %id, "FileStore::save: written");
        Ok(())
    }

    /// Load a record by id
    pub fn load<R: Record>(&self, id: &str) -> Result<R, StoreError> {
        debug!(kind = R::KIND, %id, "FileStore::load: called");
        let path = self.record_path::<R>(id);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    kind: R::KIND,
                    id: id.to_string(),
                });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&json).map_err(|source| StoreError::Corrupt { path, source })
    }

    /// List every record of a kind
    ///
    /// Unparseable files are skipped with a warning rather than failing
    /// the whole listing.
    pub fn list<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        debug!(kind = R::KIND, "FileStore::list: called");
        let dir = self.kind_dir::<R>();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(json) => match serde_json::from_str::<R>(&json) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(?path, error = %e, "FileStore::list: skipping unparseable record"),
                },
                Err(e) => warn!(?path, error = %e, "FileStore::list: skipping unreadable file"),
            }
        }

        debug!(kind = R::KIND, count = records.len(), "FileStore::list: done");
        Ok(records)
    }

    /// Delete a record by id
    pub fn delete<R: Record>(&self, id: &str) -> Result<(), StoreError> {
        debug!(kind = R::KIND, %id, "FileStore::delete: called");
        let path = self.record_path::<R>(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                kind: R::KIND,
                id: id.to_string(),
            }),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// True if a record with this id exists
    pub fn exists<R: Record>(&self, id: &str) -> bool {
        self.record_path::<R>(id).exists()
    }
}
