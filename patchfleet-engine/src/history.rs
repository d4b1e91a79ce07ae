//! History store — durable record of every pull request patchfleet opened.
//!
//! On disk a single pretty-printed JSON object keyed `"<repo>-<pr_number>"`:
//!
//! ```json
//! {
//!   "org/a-17": {"repo": "org/a", "pr_number": 17, "pr_url": "...", "patch": "add-team-metadata"}
//! }
//! ```
//!
//! Key order in the file is the store's iteration order. Writes go to a
//! `.tmp` sibling first and are renamed into place.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use patchfleet_core::{HistoryRecord, TaskOutcome, TaskResult};

use crate::error::{history_io, HistoryError};

/// Default location, relative to the working directory.
pub const DEFAULT_HISTORY_FILE: &str = ".patchfleet/pr_history.json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStore {
    records: Vec<HistoryRecord>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store at `path`. Missing or unparsable files are errors.
    pub fn load(path: &Path) -> Result<Self, HistoryError> {
        if !path.exists() {
            return Err(HistoryError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|e| history_io(path, e))?;
        serde_json::from_str(&contents).map_err(|source| HistoryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the store at `path`, starting empty if it is missing or corrupt.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(store) => store,
            Err(HistoryError::NotFound { .. }) => Self::new(),
            Err(e) => {
                tracing::warn!("{e}; starting from an empty history");
                Self::new()
            }
        }
    }

    /// Insert `record`, replacing any record with the same key in place.
    pub fn upsert(&mut self, record: HistoryRecord) {
        let key = record.key();
        match self.records.iter_mut().find(|r| r.key() == key) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Merge every successful result, recorded under `patch`. Returns the
    /// number of records written.
    pub fn merge_results(&mut self, results: &[TaskResult], patch: &str) -> usize {
        let mut merged = 0;
        for result in results {
            if let TaskOutcome::Success {
                pr_number, pr_url, ..
            } = &result.outcome
            {
                self.upsert(HistoryRecord {
                    repo: result.repo.clone(),
                    pr_number: *pr_number,
                    pr_url: pr_url.clone(),
                    patch: patch.to_string(),
                });
                merged += 1;
            }
        }
        merged
    }

    /// Write the store atomically, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| history_io(dir, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = tmp_path(path);
        std::fs::write(&tmp, json).map_err(|e| history_io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| history_io(path, e))?;
        Ok(())
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn get(&self, key: &str) -> Option<&HistoryRecord> {
        self.records.iter().find(|r| r.key() == key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// serde
// ---------------------------------------------------------------------------

impl Serialize for HistoryStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in &self.records {
            map.serialize_entry(&record.key(), record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HistoryStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(StoreVisitor)
    }
}

struct StoreVisitor;

impl<'de> Visitor<'de> for StoreVisitor {
    type Value = HistoryStore;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of \"<repo>-<pr_number>\" to PR records")
    }

    // Keys are recomputed from the records; the stored key is not trusted.
    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut store = HistoryStore::new();
        while let Some((_key, record)) = access.next_entry::<String, HistoryRecord>()? {
            store.upsert(record);
        }
        Ok(store)
    }
}
