//! Template context — serializable rendering payload for one repository.

use serde::Serialize;
use serde_json::{Map, Value};

use patchfleet_core::{Context, Invocation};

use crate::error::DescriptorError;

/// Variables visible to a patch template.
///
/// `ctx` is omitted (not `null`) when the context file has no entry for the
/// repository, so any template that reads it fails to render.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    /// Full identifier, `owner/name`.
    pub repo: String,
    /// Short name, `name`.
    pub repo_name: String,
    pub owner: String,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctx: Option<Value>,
    /// The whole context file.
    pub context: Map<String, Value>,
}

impl TemplateContext {
    pub fn new(invocation: &Invocation, context: &Context) -> Self {
        let repo = &invocation.repo;
        TemplateContext {
            repo: repo.to_string(),
            repo_name: repo.short_name().to_string(),
            owner: repo.owner().to_string(),
            dry_run: invocation.dry_run,
            ctx: context.for_repo(repo).cloned(),
            context: context.as_map().clone(),
        }
    }

    pub fn has_repo_context(&self) -> bool {
        self.ctx.is_some()
    }

    /// Convert to a [`tera::Context`] for rendering `patch`.
    pub fn to_tera_context(&self, patch: &str) -> Result<tera::Context, DescriptorError> {
        tera::Context::from_serialize(self).map_err(|e| DescriptorError::Render {
            patch: patch.to_string(),
            message: crate::error::tera_message(&e),
        })
    }
}
