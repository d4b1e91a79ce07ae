//! Error types for patchfleet-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading run configuration or context.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The file did not exist at the expected path.
    #[error("file not found at {path}")]
    NotFound { path: PathBuf },

    /// Parsed, but the content violates a config invariant.
    #[error("invalid configuration in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}
