//! Strict validation of raw patch output into a [`PatchDescriptor`].
//!
//! | Key               | Shape                        | Required | Default          |
//! |-------------------|------------------------------|----------|------------------|
//! | `branch`          | non-empty string             | yes      |                  |
//! | `commit-message`  | non-empty string             | yes      |                  |
//! | `pr-title`        | string                       | no       | commit message   |
//! | `pr-body`         | string                       | no       | `""`             |
//! | `pr-labels`       | list of strings              | no       | empty            |
//! | `pr-assignees`    | list of strings              | no       | empty            |
//! | `scripts`         | list of strings              | no       | empty            |
//! | `scripts_context` | mapping of scalars           | no       | empty            |
//!
//! Any other key is rejected so typos surface instead of silently defaulting.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use patchfleet_core::PatchDescriptor;

use crate::error::{invalid, DescriptorError};

const KNOWN_KEYS: &[&str] = &[
    "branch",
    "commit-message",
    "pr-title",
    "pr-body",
    "pr-labels",
    "pr-assignees",
    "scripts",
    "scripts_context",
];

/// Validate `raw` and fill defaults.
pub fn validate(raw: Value) -> Result<PatchDescriptor, DescriptorError> {
    let Value::Object(map) = raw else {
        return Err(invalid("<root>", "patch must produce a mapping"));
    };

    if let Some(unknown) = map.keys().find(|k| !KNOWN_KEYS.contains(&k.as_str())) {
        return Err(invalid(unknown, "unknown key"));
    }

    let branch = required_string(&map, "branch")?;
    let commit_message = required_string(&map, "commit-message")?;
    let pr_title = optional_string(&map, "pr-title")?.unwrap_or_else(|| commit_message.clone());
    let pr_body = optional_string(&map, "pr-body")?.unwrap_or_default();

    Ok(PatchDescriptor {
        branch,
        commit_message,
        pr_title,
        pr_body,
        pr_labels: string_list(&map, "pr-labels")?.into_iter().collect::<BTreeSet<_>>(),
        pr_assignees: string_list(&map, "pr-assignees")?
            .into_iter()
            .collect::<BTreeSet<_>>(),
        scripts: string_list(&map, "scripts")?,
        scripts_context: env_map(&map, "scripts_context")?,
    })
}

fn required_string(map: &Map<String, Value>, key: &str) -> Result<String, DescriptorError> {
    match optional_string(map, key)? {
        Some(s) if !s.trim().is_empty() => Ok(s),
        Some(_) => Err(invalid(key, "must not be empty")),
        None => Err(invalid(key, "is required")),
    }
}

fn optional_string(map: &Map<String, Value>, key: &str) -> Result<Option<String>, DescriptorError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(key, "must be a string")),
    }
}

fn string_list(map: &Map<String, Value>, key: &str) -> Result<Vec<String>, DescriptorError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(invalid(key, "every entry must be a string")),
            })
            .collect(),
        Some(_) => Err(invalid(key, "must be a list of strings")),
    }
}

/// Scalars are stringified (`PORT: 8080` → `"8080"`); nested values are rejected.
fn env_map(
    map: &Map<String, Value>,
    key: &str,
) -> Result<BTreeMap<String, String>, DescriptorError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(vars)) => vars
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => {
                        return Err(invalid(
                            key,
                            format!("variable `{name}` must be a scalar"),
                        ))
                    }
                };
                Ok((name.clone(), value))
            })
            .collect(),
        Some(_) => Err(invalid(key, "must be a mapping")),
    }
}
