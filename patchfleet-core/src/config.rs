//! Run configuration and context loading.
//!
//! Both files are YAML. `config.yaml` carries the repository list and commit
//! identity; the context file maps repository short names to arbitrary facts
//! that patch templates read.
//!
//! Loaders return [`ConfigError::NotFound`] for a missing file and
//! [`ConfigError::Parse`] (with path + line context) for malformed YAML.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;

use crate::error::ConfigError;
use crate::types::{Context, RunConfig};

/// Default location of the run configuration, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

fn read(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate `config.yaml`.
pub fn load_config(path: &Path) -> Result<RunConfig, ConfigError> {
    let contents = read(path)?;
    let config = parse_config(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_config(&config).map_err(|reason| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<RunConfig, serde_yaml::Error> {
    serde_yaml::from_str(contents)
}

/// Invariants: at least one repository, every id is `owner/name`, no duplicates.
pub fn validate_config(config: &RunConfig) -> Result<(), String> {
    if config.repos.is_empty() {
        return Err("`repo` must list at least one repository".to_string());
    }
    let mut seen = HashSet::new();
    for repo in &config.repos {
        if !repo.is_well_formed() {
            return Err(format!("repository '{repo}' is not in owner/name form"));
        }
        if !seen.insert(repo.as_str()) {
            return Err(format!("repository '{repo}' is listed more than once"));
        }
    }
    if config.base_branch.trim().is_empty() {
        return Err("`base-branch` must not be empty".to_string());
    }
    Ok(())
}

/// Load a context file. The root must be a mapping; an empty file is an empty context.
pub fn load_context(path: &Path) -> Result<Context, ConfigError> {
    let contents = read(path)?;
    let value: Value = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Null => Ok(Context::default()),
        Value::Object(map) => Ok(Context(map)),
        other => Err(ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: format!(
                "context root must be a mapping of repository name to facts, found {}",
                kind_of(&other)
            ),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
