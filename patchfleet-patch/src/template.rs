//! Tera-templated patch files.
//!
//! A patch file is a YAML descriptor with tera expressions in it:
//!
//! ```yaml
//! branch: sre/add-team-metadata
//! commit-message: "feat: add team metadata to kubernetes config"
//! pr-title: "[Automated] Add team metadata"
//! pr-body: |
//!   Repository's top contributor: {{ ctx.top_contributor }}
//! pr-assignees: ["{{ ctx.top_contributor }}"]
//! scripts_context:
//!   REPOSITORY: "{{ repo_name }}"
//!   TEAM_NAME: "{{ ctx.predominant_team }}"
//! scripts:
//!   - python /workspace/scripts/add-team-metadata.py
//! ```
//!
//! The template is compiled once at load time; each repository renders it
//! against its own [`TemplateContext`] and the result is parsed as YAML.
//! `{{ throw(message="...") }}` aborts resolution for a repository.

use std::path::Path;

use serde_json::Value;
use tera::Tera;

use patchfleet_core::{Context, Invocation};

use crate::context::TemplateContext;
use crate::error::{tera_message, DescriptorError};
use crate::patch::Patch;

const TEMPLATE_NAME: &str = "patch";

/// A patch loaded from a YAML+tera file.
pub struct TemplatePatch {
    name: String,
    tera: Tera,
}

impl TemplatePatch {
    /// Load and compile a patch file. The patch name is the file stem.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let source = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .unwrap_or(path.as_os_str())
            .to_string_lossy()
            .into_owned();
        Self::from_source(name, &source)
    }

    /// Compile a patch from an in-memory template.
    pub fn from_source(name: impl Into<String>, source: &str) -> Result<Self, DescriptorError> {
        let name = name.into();
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_template(TEMPLATE_NAME, source)
            .map_err(|e| DescriptorError::Render {
                patch: name.clone(),
                message: tera_message(&e),
            })?;
        Ok(TemplatePatch { name, tera })
    }

    /// Render the template for one repository without parsing it.
    pub fn render(&self, ctx: &TemplateContext) -> Result<String, DescriptorError> {
        let tera_ctx = ctx.to_tera_context(&self.name)?;
        self.tera.render(TEMPLATE_NAME, &tera_ctx).map_err(|e| {
            // A template that reads `ctx` for a repository with no context
            // fails here; report the missing context rather than tera's
            // "variable not found".
            if ctx.has_repo_context() {
                DescriptorError::Render {
                    patch: self.name.clone(),
                    message: tera_message(&e),
                }
            } else {
                DescriptorError::MissingContext {
                    repo: ctx.repo_name.clone(),
                }
            }
        })
    }
}

impl Patch for TemplatePatch {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(
        &self,
        invocation: &Invocation,
        context: &Context,
    ) -> Result<Value, DescriptorError> {
        let ctx = TemplateContext::new(invocation, context);
        let rendered = self.render(&ctx)?;
        let value: Value =
            serde_yaml::from_str(&rendered).map_err(|source| DescriptorError::Yaml {
                patch: self.name.clone(),
                source,
            })?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::resolve_descriptor;
    use patchfleet_core::RepoId;
    use serde_json::json;

    const TEAM_PATCH: &str = r#"
branch: sre/add-team-metadata
commit-message: "feat: add team metadata to kubernetes config"
pr-title: "[Automated] Add team metadata to kubernetes config"
pr-body: |
  This PR adds metadata to kubernetes configuration.

  Repository's top contributor: {{ ctx.top_contributor }}
pr-labels: [sre]
pr-assignees: ["{{ ctx.top_contributor }}"]
scripts_context:
  REPOSITORY: "{{ repo_name }}"
  TEAM_NAME: "{{ ctx.predominant_team }}"
scripts:
  - python /workspace/scripts/add-team-metadata.py
"#;

    fn context() -> Context {
        serde_json::from_value(json!({
            "sample-app": {"top_contributor": "alice", "predominant_team": "payments"},
        }))
        .unwrap()
    }

    fn invocation(repo: &str) -> Invocation {
        Invocation {
            repo: RepoId::from(repo),
            dry_run: false,
        }
    }

    #[test]
    fn renders_repository_specific_descriptor() {
        let patch = TemplatePatch::from_source("add-team-metadata", TEAM_PATCH).unwrap();
        let d = resolve_descriptor(&patch, &invocation("nsx/sample-app"), &context()).unwrap();
        assert_eq!(d.branch, "sre/add-team-metadata");
        assert!(d.pr_body.contains("top contributor: alice"));
        assert!(d.pr_assignees.contains("alice"));
        assert_eq!(d.scripts_context["REPOSITORY"], "sample-app");
        assert_eq!(d.scripts_context["TEAM_NAME"], "payments");
    }

    #[test]
    fn missing_context_names_the_repository() {
        let patch = TemplatePatch::from_source("add-team-metadata", TEAM_PATCH).unwrap();
        let err = resolve_descriptor(&patch, &invocation("nsx/unknown"), &context()).unwrap_err();
        assert!(matches!(err, DescriptorError::MissingContext { .. }), "got: {err}");
        assert_eq!(err.to_string(), "No context found for repository: unknown");
    }

    #[test]
    fn patches_without_context_references_need_no_context() {
        let patch = TemplatePatch::from_source(
            "bump",
            "branch: bot/bump-{{ repo_name }}\ncommit-message: bump\n",
        )
        .unwrap();
        let d = resolve_descriptor(&patch, &invocation("org/x"), &Context::default()).unwrap();
        assert_eq!(d.branch, "bot/bump-x");
    }

    #[test]
    fn missing_fact_in_present_context_is_a_render_error() {
        let patch = TemplatePatch::from_source(
            "needs-nope",
            "branch: b\ncommit-message: \"{{ ctx.nope }}\"\n",
        )
        .unwrap();
        let err = resolve_descriptor(&patch, &invocation("nsx/sample-app"), &context()).unwrap_err();
        match &err {
            DescriptorError::Render { patch, .. } => assert_eq!(patch, "needs-nope"),
            other => panic!("expected render error, got {other}"),
        }
        assert!(err.to_string().starts_with("patch 'needs-nope' failed to render"));
    }

    #[test]
    fn throw_aborts_with_message() {
        let patch = TemplatePatch::from_source(
            "guarded",
            "{% if repo_name == \"sample-app\" %}{{ throw(message=\"sample-app is frozen\") }}{% endif %}\nbranch: b\ncommit-message: m\n",
        )
        .unwrap();
        let err = resolve_descriptor(&patch, &invocation("nsx/sample-app"), &context()).unwrap_err();
        assert!(err.to_string().contains("sample-app is frozen"), "got: {err}");
    }

    #[test]
    fn invalid_template_syntax_fails_at_load() {
        let err = TemplatePatch::from_source("broken", "branch: {{ unclosed").err().unwrap();
        assert!(matches!(err, DescriptorError::Render { .. }));
    }

    #[test]
    fn rendered_non_yaml_is_reported() {
        let patch = TemplatePatch::from_source("bad-yaml", "branch: [unclosed\n").unwrap();
        let err = resolve_descriptor(&patch, &invocation("org/x"), &Context::default()).unwrap_err();
        assert!(matches!(err, DescriptorError::Yaml { .. }), "got: {err}");
    }

    #[test]
    fn load_uses_file_stem_as_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("patch-01-add-metadata.yaml");
        std::fs::write(&path, TEAM_PATCH).unwrap();
        let patch = TemplatePatch::load(&path).unwrap();
        assert_eq!(patch.name(), "patch-01-add-metadata");
    }
}
