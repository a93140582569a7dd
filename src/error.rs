use std::path::PathBuf;

/// Errors that can occur while reading, writing or applying checkpoints.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode checkpoint {path}: {source}")]
    Decode {
        path: PathBuf,
        source: rmp_serde::decode::Error,
    },

    #[error("failed to encode checkpoint: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("parameter '{0}' is missing from the state dict")]
    MissingParameter(String),

    #[error("unexpected parameter '{0}' in the state dict")]
    UnexpectedParameter(String),

    #[error("shape mismatch for '{key}': model has {expected:?}, state dict has {found:?}")]
    ShapeMismatch {
        key: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckpointError {
    /// True when the checkpoint blob itself could not be obtained, as opposed
    /// to a failure applying its contents.
    pub fn is_read_error(&self) -> bool {
        matches!(self, CheckpointError::Read { .. } | CheckpointError::Decode { .. })
    }
}

/// Errors that can occur when building a loader plan.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("invalid data config: {0}")]
    InvalidConfig(String),

    #[error("failed to read dataset layout {path}: {source}")]
    LayoutRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse dataset layout {path}: {source}")]
    LayoutParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Errors that can occur while saving or loading a training curve.
#[derive(Debug, thiserror::Error)]
pub enum CurveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}
