//! File-backed string store.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors from loading or persisting storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is not a JSON object of strings: {0}")]
    Format(#[from] serde_json::Error),
}

/// A thread-safe string map, optionally mirrored to a JSON file.
///
/// Clones share the same map. Every write is flushed to disk so a crash
/// never loses an acknowledged value.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    inner: Arc<DashMap<String, String>>,
    persistence_path: Option<PathBuf>,
}

impl LocalStorage {
    /// Storage that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open storage at `path`, loading existing entries if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let storage = Self {
            inner: Arc::new(DashMap::new()),
            persistence_path: Some(path.to_path_buf()),
        };

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let map: BTreeMap<String, String> = serde_json::from_reader(reader)?;
            for (k, v) in map {
                storage.inner.insert(k, v);
            }
            tracing::debug!(path = %path.display(), entries = storage.inner.len(), "Loaded local storage");
        }
        Ok(storage)
    }

    /// Read a value.
    pub fn get_item(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    /// Write a value and persist.
    pub fn set_item(&self, key: &str, value: impl Into<String>) -> Result<(), StorageError> {
        self.inner.insert(key.to_string(), value.into());
        self.flush()
    }

    /// Delete a value and persist.
    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key);
        self.flush()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn flush(&self) -> Result<(), StorageError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        // Sorted for stable diffs.
        let map: BTreeMap<_, _> = self
            .inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &map)?;
        writer.flush()?;
        Ok(())
    }
}
