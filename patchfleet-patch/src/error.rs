//! Error types for patchfleet-patch.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a patch into a [`PatchDescriptor`](patchfleet_core::PatchDescriptor)
/// for one repository. Never retried; it becomes the task's terminal error.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The context file has no entry for the repository and the patch needed one.
    #[error("No context found for repository: {repo}")]
    MissingContext { repo: String },

    /// Tera failed to parse or render the patch template.
    #[error("patch '{patch}' failed to render: {message}")]
    Render { patch: String, message: String },

    /// The rendered template is not valid YAML.
    #[error("patch '{patch}' rendered invalid YAML: {source}")]
    Yaml {
        patch: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The descriptor has the wrong shape.
    #[error("invalid descriptor field `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    /// A programmatic patch refused the repository.
    #[error("{0}")]
    Rejected(String),

    /// Filesystem error while loading a patch file.
    #[error("patch io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Neither a registered patch name nor a readable patch file.
    #[error("unknown patch '{name}': not registered and no such file")]
    UnknownPatch { name: String },
}

pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> DescriptorError {
    DescriptorError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Flatten a tera error and its sources into one line; tera's own `Display`
/// only names the template.
pub(crate) fn tera_message(err: &tera::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}
