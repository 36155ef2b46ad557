// src/storage.rs - key-value persistence for calibration results
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{CoachError, Result};
use crate::validators::{Exercise, ExerciseThresholds};

pub trait KeyValueStore: Send + Sync {
    fn put(&self, key: &str, value: Value) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<Value>>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl KeyValueStore for MemoryStore {
    fn put(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CoachError::Store("memory store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| CoachError::Store("memory store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }
}

/// All entries kept in one JSON object on disk, rewritten on every put.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "Opened threshold store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn put(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CoachError::Store("file store lock poisoned".to_string()))?;
        let mut staged = entries.clone();
        staged.insert(key.to_string(), value);
        self.flush(&staged)?;
        *entries = staged;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| CoachError::Store("file store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRecord {
    pub thresholds: ExerciseThresholds,
    pub created_at: DateTime<Utc>,
}

impl ThresholdRecord {
    pub fn new(thresholds: ExerciseThresholds) -> Self {
        Self {
            thresholds,
            created_at: Utc::now(),
        }
    }

    pub fn exercise(&self) -> Exercise {
        self.thresholds.exercise()
    }
}

pub fn thresholds_key(exercise: Exercise) -> String {
    format!("thresholds/{}", exercise)
}

/// Overwrites whatever was stored for the record's exercise.
pub fn save_thresholds(store: &dyn KeyValueStore, record: &ThresholdRecord) -> Result<()> {
    store.put(&thresholds_key(record.exercise()), serde_json::to_value(record)?)
}

pub fn load_thresholds(store: &dyn KeyValueStore, exercise: Exercise) -> Result<Option<ThresholdRecord>> {
    match store.get(&thresholds_key(exercise))? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::{PlankThresholds, SquatThresholds};

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("form_coach_store_{}", uuid::Uuid::new_v4()))
            .join("thresholds.json")
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::default();
        assert!(load_thresholds(&store, Exercise::Squat).unwrap().is_none());

        let record = ThresholdRecord::new(ExerciseThresholds::Squat(SquatThresholds {
            down_depth: 48.0,
            up_depth: 10.0,
        }));
        save_thresholds(&store, &record).unwrap();
        assert_eq!(load_thresholds(&store, Exercise::Squat).unwrap(), Some(record));
        assert!(load_thresholds(&store, Exercise::Plank).unwrap().is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let path = scratch_path();
        let record = ThresholdRecord::new(ExerciseThresholds::Plank(PlankThresholds { min_hip_angle: 168.0 }));
        {
            let store = JsonFileStore::open(&path).unwrap();
            save_thresholds(&store, &record).unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(load_thresholds(&reopened, Exercise::Plank).unwrap(), Some(record));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_later_save_overwrites() {
        let store = MemoryStore::default();
        for depth in [30.0, 55.0] {
            let record = ThresholdRecord::new(ExerciseThresholds::Squat(SquatThresholds {
                down_depth: depth,
                up_depth: 10.0,
            }));
            save_thresholds(&store, &record).unwrap();
        }
        let loaded = load_thresholds(&store, Exercise::Squat).unwrap().unwrap();
        assert_eq!(
            loaded.thresholds,
            ExerciseThresholds::Squat(SquatThresholds { down_depth: 55.0, up_depth: 10.0 })
        );
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        let root = scratch_path().parent().unwrap().to_path_buf();
        fs::create_dir_all(&root).unwrap();
        // A regular file where the store's directory should be
        let blocker = root.join("blocker");
        fs::write(&blocker, "").unwrap();

        let store = JsonFileStore::open(blocker.join("thresholds.json")).unwrap();
        assert_eq!(store.path(), blocker.join("thresholds.json").as_path());

        let record = ThresholdRecord::new(ExerciseThresholds::Squat(SquatThresholds::default()));
        assert!(save_thresholds(&store, &record).is_err());
        assert!(load_thresholds(&store, Exercise::Squat).unwrap().is_none());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = scratch_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(JsonFileStore::open(&path), Err(CoachError::Json(_))));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
