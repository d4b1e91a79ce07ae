//! `patchfleet apply` — run a patch across every configured repository.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use patchfleet_core::config::{load_config, load_context, DEFAULT_CONFIG_FILE};
use patchfleet_core::{TaskOutcome, TaskResult};
use patchfleet_engine::{Engine, GithubForge, DEFAULT_HISTORY_FILE};
use patchfleet_patch::PatchRegistry;

/// Arguments for `patchfleet apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Patch name or path to a patch file.
    pub patch: String,

    /// YAML file mapping repository names to facts for the patch.
    #[arg(long)]
    pub context: PathBuf,

    /// Run configuration listing the repositories.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Where opened pull requests are recorded.
    #[arg(long, default_value = DEFAULT_HISTORY_FILE)]
    pub history: PathBuf,

    /// Run scripts and show diffs without pushing, opening PRs or recording history.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Forge token used for cloning and API calls.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl ApplyArgs {
    pub async fn run(self) -> Result<ExitCode> {
        let config = load_config(&self.config).context("failed to load run configuration")?;
        let context = load_context(&self.context).context("failed to load context")?;
        let patch = PatchRegistry::new()
            .resolve_arg(&self.patch)
            .with_context(|| format!("failed to load patch '{}'", self.patch))?;

        let token = self.token.unwrap_or_default();
        let forge = Arc::new(GithubForge::new(&config.api_url, &token));
        let engine = Engine::new(config, context, patch, forge, &token)?.dry_run(self.dry_run);

        let report = engine.apply_patch(&self.history).await;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report.results)
                    .context("failed to serialize results")?
            );
        } else {
            print_results(&report.results, self.dry_run);
        }

        if let Some(err) = &report.history_error {
            eprintln!(
                "{} failed to record pull requests: {err}",
                "error:".red().bold()
            );
        }
        if report.has_failures() {
            return Ok(ExitCode::FAILURE);
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn print_results(results: &[TaskResult], dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    for result in results {
        match &result.outcome {
            TaskOutcome::Success {
                pr_number,
                pr_url,
                pr_action,
            } => println!(
                "{prefix}{} {}  PR #{pr_number} {pr_action}: {pr_url}",
                "✓".green().bold(),
                result.repo
            ),
            TaskOutcome::WouldChange => {
                let branch = result
                    .descriptor
                    .as_ref()
                    .map(|d| d.branch.as_str())
                    .unwrap_or("?");
                println!(
                    "{prefix}{} {}  would change (branch {branch})",
                    "~".yellow().bold(),
                    result.repo
                );
                if let Some(diff) = &result.diff {
                    for line in diff.lines() {
                        println!("    {}", colorize_diff_line(line));
                    }
                }
            }
            TaskOutcome::Error { error } => println!(
                "{prefix}{} {}  {error}",
                "✗".red().bold(),
                result.repo
            ),
        }
    }

    let failed = results.iter().filter(|r| r.is_error()).count();
    let succeeded = results.len() - failed;
    let verb = if dry_run { "would change" } else { "succeeded" };
    println!("{prefix}{succeeded} {verb}, {failed} failed");
}

fn colorize_diff_line(line: &str) -> String {
    if line.starts_with("+++") || line.starts_with("---") {
        line.bold().to_string()
    } else if line.starts_with('+') {
        line.green().to_string()
    } else if line.starts_with('-') {
        line.red().to_string()
    } else if line.starts_with("@@") {
        line.cyan().to_string()
    } else {
        line.to_string()
    }
}
