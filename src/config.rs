use std::path::Path;

use tracing::warn;

use crate::checkpoint::{CheckpointStoreConfig, TransferOptions};
use crate::data::{DataConfig, ReidDataset};
use crate::error::ConfigError;
use crate::model::ReidClassifierConfig;

/// Shape of the re-ID classifier built for transfers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub input_dim: usize,
    pub feature_dim: usize,
    /// Classifier width. A dataset layout passed to `transfer` overrides it.
    pub num_classes: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            input_dim: 2048,
            feature_dim: 256,
            num_classes: 751,
        }
    }
}

impl ModelConfig {
    /// Classifier width for a run: the dataset's identity count when one is
    /// given, otherwise `num_classes`.
    pub fn class_count(&self, dataset: Option<&dyn ReidDataset>) -> usize {
        dataset.map_or(self.num_classes, |d| d.num_train_ids())
    }

    pub fn classifier(&self, num_classes: usize) -> ReidClassifierConfig {
        ReidClassifierConfig::new(self.input_dim, num_classes).with_feature_dim(self.feature_dim)
    }
}

/// Top-level application configuration, loadable from TOML.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub data: DataConfig,
    pub transfer: TransferOptions,
    pub checkpoint: CheckpointStoreConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.input_dim == 0 {
            return Err(ConfigError::Validation(
                "model.input_dim must be > 0".into(),
            ));
        }
        if self.model.feature_dim == 0 {
            return Err(ConfigError::Validation(
                "model.feature_dim must be > 0".into(),
            ));
        }
        if self.transfer.head_marker.is_empty() {
            return Err(ConfigError::Validation(
                "transfer.head_marker must not be empty".into(),
            ));
        }
        if self.checkpoint.file_name == self.checkpoint.best_file_name {
            return Err(ConfigError::Validation(
                "checkpoint.file_name and checkpoint.best_file_name must differ".into(),
            ));
        }
        self.data
            .validate()
            .map_err(|e| ConfigError::Validation(format!("data: {e}")))?;

        Ok(())
    }

    /// Generate a TOML string with all default values (useful for creating
    /// example config files).
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&AppConfig::default())
    }
}

/// Parse a command-line boolean. Only "true", in any case, is true.
pub fn parse_bool_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}
