// src/recording/storage.rs
//! Durable record storage
//!
//! Keeps every [`RecordInfo`] in memory and persists the full collection as a
//! JSON snapshot after each change. Snapshots are written to a sibling
//! `.new` file, synced and renamed over the previous one, so a crash leaves
//! either the old or the new snapshot on disk.
//!
//! Mutations are serialized by a single async guard which is held across the
//! snapshot write. The in-memory map is only updated once the snapshot is on
//! disk.

use crate::contest::model::RunId;
use crate::recording::record::{reduce, RecordInfo, RecordIntent};
use crate::utils::errors::{RecorderError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot file
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("storage.json"),
        }
    }
}

/// Outcome of [`RecordStorage::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The decision declined to change anything
    Skipped { existing: Option<RecordInfo> },

    /// The intent did not change the record, nothing was written
    Unchanged { record: RecordInfo },

    /// The record was changed and persisted
    Written {
        previous: Option<RecordInfo>,
        current: RecordInfo,
    },
}

impl Applied {
    pub fn is_written(&self) -> bool {
        matches!(self, Applied::Written { .. })
    }
}

/// Crash-safe map from run id to recording state
pub struct RecordStorage {
    path: PathBuf,
    records: RwLock<HashMap<RunId, RecordInfo>>,
    write_guard: Mutex<()>,
}

impl RecordStorage {
    /// Open the storage, loading the previous snapshot if there is one
    ///
    /// A missing or unreadable snapshot is not an error: the recorder simply
    /// starts without history.
    pub async fn open(config: StorageConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                RecorderError::StorageFailed(format!("Failed to create directory: {}", e))
            })?;
        }

        let records = Self::load(&config.path).await;
        info!(
            "Record storage opened at {:?} with {} records",
            config.path,
            records.len()
        );

        Ok(Self {
            path: config.path,
            records: RwLock::new(records),
            write_guard: Mutex::new(()),
        })
    }

    async fn load(path: &Path) -> HashMap<RunId, RecordInfo> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No storage snapshot at {:?}, starting empty", path);
                return HashMap::new();
            }
            Err(e) => {
                warn!("Failed to read storage snapshot {:?}, starting empty: {}", path, e);
                return HashMap::new();
            }
        };

        match serde_json::from_slice::<Vec<RecordInfo>>(&data) {
            Ok(list) => list
                .into_iter()
                .map(|record| (record.run_id.clone(), record))
                .collect(),
            Err(e) => {
                warn!("Unreadable storage snapshot {:?}, starting empty: {}", path, e);
                HashMap::new()
            }
        }
    }

    /// Current record of `run_id`
    pub fn get(&self, run_id: &RunId) -> Option<RecordInfo> {
        self.records.read().get(run_id).cloned()
    }

    /// All records ordered by start time
    pub fn records(&self) -> Vec<RecordInfo> {
        let mut list: Vec<RecordInfo> = self.records.read().values().cloned().collect();
        sort_by_start(&mut list);
        list
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Decide and apply a change to one record under the storage guard
    ///
    /// `decide` sees the current record and returns the intent to apply, or
    /// `None` to leave it alone.
    pub async fn apply<F>(&self, run_id: &RunId, decide: F) -> Result<Applied>
    where
        F: FnOnce(Option<&RecordInfo>) -> Option<RecordIntent>,
    {
        let _guard = self.write_guard.lock().await;

        let previous = self.get(run_id);
        let Some(intent) = decide(previous.as_ref()) else {
            return Ok(Applied::Skipped { existing: previous });
        };

        let current = reduce(previous.as_ref(), run_id, intent);
        if previous.as_ref() == Some(&current) {
            return Ok(Applied::Unchanged { record: current });
        }

        let snapshot = {
            let records = self.records.read();
            let mut list: Vec<RecordInfo> = records
                .values()
                .filter(|record| &record.run_id != run_id)
                .cloned()
                .collect();
            list.push(current.clone());
            sort_by_start(&mut list);
            list
        };

        self.persist(&snapshot).await?;
        self.records.write().insert(run_id.clone(), current.clone());

        Ok(Applied::Written { previous, current })
    }

    /// Record the start time unless the run already has one
    pub async fn set_start_time(&self, run_id: &RunId, start: DateTime<Utc>) -> Result<Applied> {
        self.apply(run_id, |_| Some(RecordIntent::Start { at: start }))
            .await
    }

    /// Record the stop time unless the run already has one
    pub async fn set_stop_time(&self, run_id: &RunId, stop: DateTime<Utc>) -> Result<Applied> {
        self.apply(run_id, |_| Some(RecordIntent::Stop { at: stop }))
            .await
    }

    /// Record start and stop times, filling only the missing ones
    pub async fn set_start_and_stop_time(
        &self,
        run_id: &RunId,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Applied> {
        self.apply(run_id, |_| Some(RecordIntent::StartWithStop { start, stop }))
            .await
    }

    async fn persist(&self, records: &[RecordInfo]) -> Result<()> {
        let data = serde_json::to_vec_pretty(records).map_err(|e| {
            RecorderError::StorageFailed(format!("Serialization error: {}", e))
        })?;

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            RecorderError::StorageFailed(format!("Failed to create {:?}: {}", temp_path, e))
        })?;
        file.write_all(&data).await.map_err(|e| {
            RecorderError::StorageFailed(format!("Failed to write {:?}: {}", temp_path, e))
        })?;
        file.sync_all().await.map_err(|e| {
            RecorderError::StorageFailed(format!("Failed to sync {:?}: {}", temp_path, e))
        })?;
        drop(file);

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            RecorderError::StorageFailed(format!("Failed to replace {:?}: {}", self.path, e))
        })?;

        debug!("Persisted {} records to {:?}", records.len(), self.path);
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".new");
        self.path.with_file_name(name)
    }
}

fn sort_by_start(records: &mut [RecordInfo]) {
    records.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.run_id.cmp(&b.run_id))
    });
}
