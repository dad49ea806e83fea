//! Error types for the pod state handler.

use std::path::PathBuf;
use thiserror::Error;

use podstate::ConfigError;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pod events: {0}")]
    Events(#[from] serde_json::Error),

    #[error("Invalid settings: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, MonitorError>;

/// Read a file, attaching the path to any error.
pub(crate) fn read_file(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| MonitorError::Io {
        path: path.to_path_buf(),
        source,
    })
}
