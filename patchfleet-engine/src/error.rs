//! Error types for patchfleet-engine.

use std::path::PathBuf;

use thiserror::Error;

use patchfleet_patch::DescriptorError;

/// A git subprocess exited nonzero or could not be started.
#[derive(Debug, Error)]
#[error("`git {args}` failed{}: {stderr}", describe_status(.status))]
pub struct GitCommandError {
    /// Arguments, with credentials redacted.
    pub args: String,
    pub status: Option<i32>,
    pub stderr: String,
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!(" with exit code {code}"),
        None => String::new(),
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Everything that can end one repository's task. Caught at the task
/// boundary and turned into that repository's `error` result.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("failed to clone {repo}: {source}")]
    Clone {
        repo: String,
        #[source]
        source: GitCommandError,
    },

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("script `{command}` failed with {}", describe_exit(.exit_code))]
    Script {
        command: String,
        exit_code: Option<i32>,
    },

    #[error("No changes detected after applying patch")]
    NoChangeDetected,

    #[error("git operation failed: {0}")]
    GitOps(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("repository task aborted: {0}")]
    Join(String),
}

impl From<GitCommandError> for ApplyError {
    fn from(err: GitCommandError) -> Self {
        ApplyError::GitOps(err.to_string())
    }
}

impl From<ForgeError> for ApplyError {
    fn from(err: ForgeError) -> Self {
        ApplyError::GitOps(err.to_string())
    }
}

/// Failure talking to the forge REST API.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("{method} {path} returned HTTP {status}: {message}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
        message: String,
    },

    #[error("{method} {path} failed: {message}")]
    Transport {
        method: &'static str,
        path: String,
        message: String,
    },

    #[error("unexpected response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("forge call aborted: {0}")]
    Join(String),
}

/// Failure reading or writing the PR history file.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("no PR history found at {path}; run `patchfleet apply` first")]
    NotFound { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse PR history at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("PR history JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run-fatal conditions, checked before any repository task starts.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("an authentication token is required (set GITHUB_TOKEN)")]
    MissingToken,

    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Convenience constructor for [`HistoryError::Io`].
pub(crate) fn history_io(path: impl Into<PathBuf>, source: std::io::Error) -> HistoryError {
    HistoryError::Io {
        path: path.into(),
        source,
    }
}
