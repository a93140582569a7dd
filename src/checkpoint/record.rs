use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checkpoint::params::ParameterSet;
use crate::error::CheckpointError;

/// Persisted snapshot of model parameters plus training progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub state_dict: ParameterSet,
    pub epoch: usize,
    pub best_top1: f64,
}

impl CheckpointRecord {
    /// Read and decode a MessagePack checkpoint.
    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let bytes = fs::read(path).map_err(|e| CheckpointError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let record: CheckpointRecord =
            rmp_serde::from_slice(&bytes).map_err(|e| CheckpointError::Decode {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!(
            path = %path.display(),
            epoch = record.epoch,
            params = record.state_dict.len(),
            "checkpoint decoded"
        );
        Ok(record)
    }

    /// Encode and write the checkpoint, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = rmp_serde::to_vec_named(self)?;

        let mut tmp: OsString = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Configuration for the checkpoint store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointStoreConfig {
    pub checkpoint_dir: PathBuf,
    pub file_name: String,
    pub best_file_name: String,
}

impl Default for CheckpointStoreConfig {
    fn default() -> Self {
        CheckpointStoreConfig {
            checkpoint_dir: PathBuf::from("checkpoints"),
            file_name: "checkpoint.mpk".to_string(),
            best_file_name: "model_best.mpk".to_string(),
        }
    }
}

/// Keeps the most recent checkpoint and a copy of the best one in a directory.
pub struct CheckpointStore {
    config: CheckpointStoreConfig,
}

impl CheckpointStore {
    pub fn new(config: CheckpointStoreConfig) -> Self {
        fs::create_dir_all(&config.checkpoint_dir).ok();
        CheckpointStore { config }
    }

    pub fn latest_path(&self) -> PathBuf {
        self.config.checkpoint_dir.join(&self.config.file_name)
    }

    pub fn best_path(&self) -> PathBuf {
        self.config.checkpoint_dir.join(&self.config.best_file_name)
    }

    /// Write `record` as the latest checkpoint. When `is_best`, the written
    /// file is also copied over the best checkpoint.
    pub fn save(&self, record: &CheckpointRecord, is_best: bool) -> Result<PathBuf, CheckpointError> {
        let latest = self.latest_path();
        record.save(&latest)?;

        if is_best {
            let best = self.best_path();
            let mut tmp: OsString = best.as_os_str().to_owned();
            tmp.push(".tmp");
            let tmp = PathBuf::from(tmp);
            fs::copy(&latest, &tmp)?;
            fs::rename(&tmp, &best)?;
        }
        Ok(latest)
    }

    pub fn load_latest(&self) -> Result<CheckpointRecord, CheckpointError> {
        CheckpointRecord::load(&self.latest_path())
    }

    pub fn load_best(&self) -> Result<CheckpointRecord, CheckpointError> {
        CheckpointRecord::load(&self.best_path())
    }
}
