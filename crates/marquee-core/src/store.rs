//! Renewal record persistence
//!
//! A flat key -> timestamp map. Keys are independent, so no
//! transactional guarantees are needed.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Next renewal time of one content item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalRecord {
    pub content_key: String,
    pub next_renewal_at: DateTime<Utc>,
}

impl RenewalRecord {
    /// True when the renewal time is at or before `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_renewal_at <= now
    }
}

/// Persistent store for renewal timestamps
pub trait RenewalStore: Send + Sync {
    /// Timestamp for `key`; unreadable values count as absent
    fn get(&self, key: &str) -> Option<DateTime<Utc>>;

    fn set(&self, key: &str, at: DateTime<Utc>) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// All readable records, ordered by key
    fn records(&self) -> Vec<RenewalRecord>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RenewalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.lock().get(key).copied()
    }

    fn set(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.lock().insert(key.to_string(), at);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    fn records(&self) -> Vec<RenewalRecord> {
        let mut records: Vec<_> = self
            .lock()
            .iter()
            .map(|(key, at)| RenewalRecord {
                content_key: key.clone(),
                next_renewal_at: *at,
            })
            .collect();
        records.sort_by(|a, b| a.content_key.cmp(&b.content_key));
        records
    }
}

/// Store backed by a JSON object of RFC 3339 timestamps
///
/// ```json
/// { "https://fps.ezdrm.com/demo/video/ezdrm.m3u8": "2024-05-02T09:30:00Z" }
/// ```
///
/// Every mutation rewrites the file through a temporary sibling and a rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl JsonFileStore {
    /// Open a store; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text).map_err(|e| {
                    Error::store(format!("{} is not a JSON object: {}", path.display(), e))
                })?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "Renewal store opened");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, serde_json::Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, entries: &BTreeMap<String, serde_json::Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl RenewalStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        let value = self.lock().get(key).cloned()?;
        match serde_json::from_value(value) {
            Ok(at) => Some(at),
            Err(e) => {
                warn!(key, error = %e, "Ignoring unreadable renewal timestamp");
                None
            }
        }
    }

    fn set(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        let mut entries = self.lock();
        entries.insert(key.to_string(), serde_json::Value::String(at.to_rfc3339()));
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.lock();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn records(&self) -> Vec<RenewalRecord> {
        self.lock()
            .iter()
            .filter_map(|(key, value)| {
                let at = serde_json::from_value(value.clone()).ok()?;
                Some(RenewalRecord {
                    content_key: key.clone(),
                    next_renewal_at: at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap();
        assert!(store.get("a").is_none());
        store.set("a", at).unwrap();
        assert_eq!(store.get("a"), Some(at));
        store.remove("a").unwrap();
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renewals.json");
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        store.set("https://cdn.example.com/a.m3u8", at).unwrap();
        drop(store);

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("https://cdn.example.com/a.m3u8"), Some(at));
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn test_json_store_invalid_timestamp_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renewals.json");
        std::fs::write(&path, r#"{"movie":"yesterday-ish","other":42}"#).unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.get("movie").is_none());
        assert!(store.get("other").is_none());
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renewals.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let err = JsonFileStore::open(&path).unwrap_err();
        assert_eq!(err.error_code(), "STORE");
    }
}
