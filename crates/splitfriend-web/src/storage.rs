//! File-backed `localStorage`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use splitfriend_common::SplitFriendError;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize storage: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<StorageError> for SplitFriendError {
    fn from(err: StorageError) -> Self {
        SplitFriendError::storage_with_source("local storage", err)
    }
}

/// String key/value store persisted as a JSON object.
///
/// Every mutation is written through to disk.
#[derive(Debug)]
pub struct LocalStorage {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl LocalStorage {
    /// Open the store at `path`. A missing or corrupt file reads as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Local storage corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        debug!(path = %path.display(), items = items.len(), "Local storage opened");
        Self { path, items }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        self.flush()
    }

    pub fn remove_item(&mut self, key: &str) -> Result<Option<String>, StorageError> {
        let removed = self.items.remove(key);
        if removed.is_some() {
            self.flush()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.items.clear();
        self.flush()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn flush(&self) -> Result<(), StorageError> {
        let data = serde_json::to_string_pretty(&self.items)?;
        let write = |path: &Path| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, data.as_bytes())
        };
        write(&self.path).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
