//! Repository task orchestrator.
//!
//! One tokio task per configured repository, each with its own workspace and
//! descriptor. Nothing a task does (error, script failure, panic) reaches
//! another task: every failure becomes that repository's `error` result.
//! Results are collected in configuration order regardless of which task
//! finishes first.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tracing::Instrument;

use patchfleet_core::{
    Context, Invocation, PatchDescriptor, RepoId, RunConfig, TaskOutcome, TaskResult,
};
use patchfleet_patch::{resolve_descriptor, Patch};

use crate::detect::detect_changes;
use crate::error::{ApplyError, EngineError, HistoryError};
use crate::forge::Forge;
use crate::history::HistoryStore;
use crate::reconcile::{reconcile_branch, reconcile_pull};
use crate::scripts::run_scripts;
use crate::workspace::Workspace;

/// Outcome of [`Engine::apply_patch`]: one result per repository, plus the
/// history write failure if there was one.
#[derive(Debug)]
pub struct RunReport {
    pub results: Vec<TaskResult>,
    pub history_error: Option<HistoryError>,
}

impl RunReport {
    /// Whether any repository failed or the history could not be written.
    pub fn has_failures(&self) -> bool {
        self.history_error.is_some() || self.results.iter().any(TaskResult::is_error)
    }
}

/// Everything a batch run shares. Cheap to clone; each task holds a clone.
#[derive(Clone)]
pub struct Engine {
    config: Arc<RunConfig>,
    context: Arc<Context>,
    patch: Arc<dyn Patch>,
    forge: Arc<dyn Forge>,
    token: Arc<str>,
    dry_run: bool,
}

impl Engine {
    /// Fails with [`EngineError::MissingToken`] when `token` is blank.
    pub fn new(
        config: RunConfig,
        context: Context,
        patch: Arc<dyn Patch>,
        forge: Arc<dyn Forge>,
        token: &str,
    ) -> Result<Self, EngineError> {
        if token.trim().is_empty() {
            return Err(EngineError::MissingToken);
        }
        Ok(Engine {
            config: Arc::new(config),
            context: Arc::new(context),
            patch,
            forge,
            token: Arc::from(token),
            dry_run: false,
        })
    }

    /// Execute scripts and detect changes, but write nothing remotely.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the patch against every configured repository. Exactly one result
    /// per repository, in configuration order.
    pub async fn apply_all(&self) -> Vec<TaskResult> {
        tracing::info!(
            "applying {} to {} repositories{}",
            self.patch.name(),
            self.config.repos.len(),
            if self.dry_run { " (dry run)" } else { "" }
        );

        let handles: Vec<_> = self
            .config
            .repos
            .iter()
            .map(|repo| {
                let engine = self.clone();
                let repo = repo.clone();
                let span = tracing::info_span!("repo", repo = %repo);
                (
                    repo.clone(),
                    tokio::spawn(async move { engine.run_repo(repo).await }.instrument(span)),
                )
            })
            .collect();

        let (repos, handles): (Vec<RepoId>, Vec<_>) = handles.into_iter().unzip();
        join_all(handles)
            .await
            .into_iter()
            .zip(repos)
            .map(|(joined, repo)| match joined {
                Ok(result) => result,
                Err(e) => {
                    let err = ApplyError::Join(e.to_string());
                    tracing::error!("task for {repo} failed: {err}");
                    TaskResult::error(repo, err.to_string())
                }
            })
            .collect()
    }

    /// [`apply_all`](Self::apply_all), then merge successful pull requests into
    /// the history at `history_path`. Dry runs never touch the history.
    ///
    /// A history write failure does not discard the results: branches were
    /// pushed and pull requests opened regardless, so it is reported next to
    /// them.
    pub async fn apply_patch(&self, history_path: &Path) -> RunReport {
        let results = self.apply_all().await;
        if self.dry_run {
            return RunReport {
                results,
                history_error: None,
            };
        }

        let mut store = HistoryStore::load_or_empty(history_path);
        let merged = store.merge_results(&results, self.patch.name());
        let history_error = match store.save(history_path) {
            Ok(()) => {
                tracing::info!(
                    "recorded {merged} pull request(s) in {}",
                    history_path.display()
                );
                None
            }
            Err(e) => {
                tracing::error!("failed to record {merged} pull request(s): {e}");
                Some(e)
            }
        };
        RunReport {
            results,
            history_error,
        }
    }

    async fn run_repo(self, repo: RepoId) -> TaskResult {
        let mut descriptor = None;
        let mut diff = None;
        let outcome = match self.drive(&repo, &mut descriptor, &mut diff).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("{e}");
                TaskOutcome::Error {
                    error: e.to_string(),
                }
            }
        };
        TaskResult {
            repo,
            outcome,
            descriptor,
            diff,
        }
    }

    /// resolve → provision → scripts → detect → (stop | reconcile). The
    /// descriptor and diff are handed back through the out-params even when a
    /// later step fails.
    async fn drive(
        &self,
        repo: &RepoId,
        descriptor: &mut Option<PatchDescriptor>,
        diff: &mut Option<String>,
    ) -> Result<TaskOutcome, ApplyError> {
        let invocation = Invocation {
            repo: repo.clone(),
            dry_run: self.dry_run,
        };
        let resolved = resolve_descriptor(self.patch.as_ref(), &invocation, &self.context)?;
        let descriptor = descriptor.insert(resolved);

        let url = self.config.clone_url(repo, &self.token);
        let workspace = Workspace::provision(repo, &url, &self.config.identity()).await?;
        let outcome = self.in_workspace(&workspace, descriptor, diff).await;
        workspace.release().await;
        outcome
    }

    async fn in_workspace(
        &self,
        workspace: &Workspace,
        descriptor: &PatchDescriptor,
        diff: &mut Option<String>,
    ) -> Result<TaskOutcome, ApplyError> {
        run_scripts(
            workspace.path(),
            &descriptor.scripts,
            &descriptor.scripts_context,
        )
        .await?;

        let git = workspace.git();
        let changes = detect_changes(&git).await?;
        let changes = diff.insert(changes);
        tracing::info!("{} changed line(s)", count_changed_lines(changes));

        if self.dry_run {
            return Ok(TaskOutcome::WouldChange);
        }

        reconcile_branch(&git, descriptor).await?;
        let pull = reconcile_pull(
            self.forge.as_ref(),
            workspace.repo(),
            &self.config.base_branch,
            descriptor,
        )
        .await?;
        Ok(TaskOutcome::Success {
            pr_number: pull.number,
            pr_url: pull.url,
            pr_action: pull.action,
        })
    }
}

fn count_changed_lines(diff: &str) -> usize {
    diff.lines()
        .filter(|l| {
            (l.starts_with('+') && !l.starts_with("+++"))
                || (l.starts_with('-') && !l.starts_with("---"))
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryForge;
    use crate::test_support::bare_remote;
    use patchfleet_patch::FnPatch;
    use serde_json::json;

    fn patch() -> Arc<dyn Patch> {
        Arc::new(FnPatch::new("noop", |_: &Invocation, _: &Context| {
            Ok(json!({"branch": "b", "commit-message": "m"}))
        }))
    }

    #[test]
    fn blank_token_is_rejected_before_any_task() {
        let err = Engine::new(
            RunConfig::new(vec![RepoId::from("org/a")]),
            Context::default(),
            patch(),
            Arc::new(MemoryForge::new()),
            "  ",
        )
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::MissingToken));
    }

    #[test]
    fn changed_lines_skip_file_headers() {
        let diff = "--- a/x\n+++ b/x\n@@ -1 +1 @@\n-old\n+new\n+more\n";
        assert_eq!(count_changed_lines(diff), 3);
    }

    #[tokio::test]
    async fn failed_task_releases_its_workspace() {
        let remotes = tempfile::TempDir::new().unwrap();
        let scratch = tempfile::TempDir::new().unwrap();
        let repo = RepoId::from("org/a");
        bare_remote(remotes.path(), &repo, &[("README.md", "hi\n")]);

        let record = scratch.path().join("workspace-path");
        let script = format!("pwd > {}; exit 1", record.display());
        let patch: Arc<dyn Patch> = Arc::new(FnPatch::new("fails", move |_: &Invocation, _: &Context| {
            Ok(json!({"branch": "b", "commit-message": "m", "scripts": [script.clone()]}))
        }));
        let mut config = RunConfig::new(vec![repo]);
        config.remote_url = Some(format!("file://{}/{{repo}}.git", remotes.path().display()));
        let engine = Engine::new(config, Context::default(), patch, Arc::new(MemoryForge::new()), "t")
            .unwrap();

        let results = engine.apply_all().await;
        assert!(results[0].is_error());
        let workspace = std::fs::read_to_string(&record).unwrap();
        assert!(!Path::new(workspace.trim()).exists(), "workspace must be removed");
    }

    #[tokio::test]
    async fn unreachable_remotes_fail_per_repository_in_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = RunConfig::new(vec![RepoId::from("org/b"), RepoId::from("org/a")]);
        config.remote_url = Some(format!("file://{}/{{repo}}.git", dir.path().display()));
        let engine = Engine::new(
            config,
            Context::default(),
            patch(),
            Arc::new(MemoryForge::new()),
            "t",
        )
        .unwrap();

        let results = engine.apply_all().await;
        let repos: Vec<&str> = results.iter().map(|r| r.repo.as_str()).collect();
        assert_eq!(repos, vec!["org/b", "org/a"]);
        for result in &results {
            assert!(result.error_message().unwrap().contains("failed to clone"));
            assert_eq!(result.descriptor.as_ref().unwrap().branch, "b");
        }
    }
}
