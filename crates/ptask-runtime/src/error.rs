//! Error types for runtime setup.

use std::path::PathBuf;

use ptask_errors::PtaskError;

/// Errors raised while loading configuration or building a runtime.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON configuration.
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML configuration.
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The file extension is neither JSON nor YAML.
    #[error("unsupported configuration format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),

    /// The runtime rejected the configuration.
    #[error(transparent)]
    Runtime(#[from] PtaskError),
}

/// Result type for configuration and runtime setup.
pub type ConfigResult<T> = Result<T, ConfigError>;
