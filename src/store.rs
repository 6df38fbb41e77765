//! Key-value configuration store and downstream cache hooks.
//!
//! Generated artifacts, run logs and settings are persisted as rows keyed by
//! `(key, kind)`. The store is a collaborator of the pipeline, not part of
//! it; the default implementation keeps rows in a single JSON file and
//! writes through a temp file so a failed write never corrupts prior rows.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One stored row. `updated_at` is RFC 3339.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreRow {
    pub key: String,
    pub kind: String,
    pub value: String,
    pub updated_at: String,
}

pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str, kind: &str) -> Option<StoreRow>;
    /// Updates the row in place if `(key, kind)` exists, inserts otherwise.
    fn upsert(&self, key: &str, kind: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str, kind: &str) -> Result<(), StoreError>;
}

/// Downstream node cache that must be dropped after a successful
/// regeneration so subscription serving picks up the new artifacts.
pub trait NodeCache: Send + Sync {
    fn invalidate(&self) -> anyhow::Result<()>;
}

/// Cache hook for deployments without a node cache.
pub struct NoopCache;

impl NodeCache for NoopCache {
    fn invalidate(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

fn touch(rows: &mut Vec<StoreRow>, key: &str, kind: &str, value: &str) {
    let now = Utc::now().to_rfc3339();
    match rows.iter_mut().find(|r| r.key == key && r.kind == kind) {
        Some(row) => {
            row.value = value.to_string();
            row.updated_at = now;
        }
        None => rows.push(StoreRow {
            key: key.to_string(),
            kind: kind.to_string(),
            value: value.to_string(),
            updated_at: now,
        }),
    }
}

/// In-memory store, used by validation runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<StoreRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str, kind: &str) -> Option<StoreRow> {
        let rows = self.rows.lock().unwrap();
        rows.iter().find(|r| r.key == key && r.kind == kind).cloned()
    }

    fn upsert(&self, key: &str, kind: &str, value: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        touch(&mut rows, key, kind, value);
        Ok(())
    }

    fn delete(&self, key: &str, kind: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        rows.retain(|r| !(r.key == key && r.kind == kind));
        Ok(())
    }
}

/// JSON-file-backed store.
pub struct FileStore {
    path: PathBuf,
    rows: Mutex<Vec<StoreRow>>,
}

impl FileStore {
    /// Opens the store, loading existing rows when the file is present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let rows = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(FileStore {
            path,
            rows: Mutex::new(rows),
        })
    }

    fn persist(&self, rows: &[StoreRow]) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(rows)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ConfigStore for FileStore {
    fn get(&self, key: &str, kind: &str) -> Option<StoreRow> {
        let rows = self.rows.lock().unwrap();
        rows.iter().find(|r| r.key == key && r.kind == kind).cloned()
    }

    fn upsert(&self, key: &str, kind: &str, value: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.clone();
        touch(&mut rows, key, kind, value);
        if let Err(e) = self.persist(&rows) {
            // Roll back so memory matches what is durably stored.
            *rows = before;
            return Err(e);
        }
        Ok(())
    }

    fn delete(&self, key: &str, kind: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.clone();
        rows.retain(|r| !(r.key == key && r.kind == kind));
        if let Err(e) = self.persist(&rows) {
            *rows = before;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_upsert_overwrites() {
        let store = MemoryStore::new();
        store.upsert("k", "t", "v1").unwrap();
        store.upsert("k", "t", "v2").unwrap();
        assert_eq!(store.get("k", "t").unwrap().value, "v2");
        assert!(store.get("k", "other").is_none());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = FileStore::open(&path).unwrap();
            store.upsert("clash_config", "clash", "body").unwrap();
        }
        let reopened = FileStore::open(&path).unwrap();
        let row = reopened.get("clash_config", "clash").unwrap();
        assert_eq!(row.value, "body");
        assert!(!row.updated_at.is_empty());
    }

    #[test]
    fn test_file_store_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(&path).unwrap();
        store.upsert("a", "t", "1").unwrap();
        store.delete("a", "t").unwrap();
        assert!(store.get("a", "t").is_none());
    }
}
