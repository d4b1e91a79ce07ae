//! Patch lookup by name or path.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::DescriptorError;
use crate::patch::Patch;
use crate::template::TemplatePatch;

/// Patches known by name, with file paths as the fallback.
#[derive(Default)]
pub struct PatchRegistry {
    patches: BTreeMap<String, Arc<dyn Patch>>,
}

impl PatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `patch` under its own name, replacing any previous entry.
    pub fn register(&mut self, patch: Arc<dyn Patch>) {
        self.patches.insert(patch.name().to_string(), patch);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patches.keys().map(String::as_str)
    }

    /// A registered patch named `arg`, else the template file at path `arg`.
    pub fn resolve_arg(&self, arg: &str) -> Result<Arc<dyn Patch>, DescriptorError> {
        if let Some(patch) = self.patches.get(arg) {
            return Ok(Arc::clone(patch));
        }
        let path = Path::new(arg);
        if path.is_file() {
            return Ok(Arc::new(TemplatePatch::load(path)?));
        }
        Err(DescriptorError::UnknownPatch {
            name: arg.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::FnPatch;
    use patchfleet_core::{Context, Invocation};
    use serde_json::json;

    #[test]
    fn registered_name_wins() {
        let mut registry = PatchRegistry::new();
        registry.register(Arc::new(FnPatch::new("noop", |_: &Invocation, _: &Context| {
            Ok(json!({}))
        })));
        let patch = registry.resolve_arg("noop").unwrap();
        assert_eq!(patch.name(), "noop");
        assert_eq!(registry.names().collect::<Vec<_>>(), ["noop"]);
    }

    #[test]
    fn falls_back_to_file_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bump.yaml");
        std::fs::write(&path, "branch: b\ncommit-message: m\n").unwrap();

        let registry = PatchRegistry::new();
        let patch = registry.resolve_arg(path.to_str().unwrap()).unwrap();
        assert_eq!(patch.name(), "bump");
    }

    #[test]
    fn unknown_arg_is_an_error() {
        let registry = PatchRegistry::new();
        let err = registry.resolve_arg("/definitely/not/here.yaml").err().unwrap();
        assert!(matches!(err, DescriptorError::UnknownPatch { .. }));
    }
}
