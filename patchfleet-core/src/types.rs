//! Domain types shared by every patchfleet crate.
//!
//! Everything here is plain data: serializable via serde, cheap to clone, and
//! free of I/O. Configuration and context are read-only once loaded and are
//! shared between concurrent repository tasks behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A repository identifier in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(pub String);

impl RepoId {
    /// The part after the last `/` (`sample-app` for `org/sample-app`).
    pub fn short_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The part before the first `/`, or the whole id when there is none.
    pub fn owner(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the id has exactly one `/` with non-empty parts on both sides.
    pub fn is_well_formed(&self) -> bool {
        let mut parts = self.0.split('/');
        matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        )
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_AUTHOR_NAME: &str = "SRE Team";
pub const DEFAULT_AUTHOR_EMAIL: &str = "sre@users.noreply.github.com";
pub const DEFAULT_BASE_BRANCH: &str = "main";
pub const DEFAULT_GIT_HOST: &str = "github.com";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Shared, read-only configuration for a run (`config.yaml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RunConfig {
    /// Repositories to patch, in report order.
    #[serde(rename = "repo")]
    pub repos: Vec<RepoId>,
    #[serde(default = "default_author_name")]
    pub author_name: String,
    #[serde(default = "default_author_email")]
    pub author_email: String,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    #[serde(default = "default_git_host")]
    pub git_host: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Clone URL template with `{repo}` and `{token}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
}

fn default_author_name() -> String {
    DEFAULT_AUTHOR_NAME.to_string()
}

fn default_author_email() -> String {
    DEFAULT_AUTHOR_EMAIL.to_string()
}

fn default_base_branch() -> String {
    DEFAULT_BASE_BRANCH.to_string()
}

fn default_git_host() -> String {
    DEFAULT_GIT_HOST.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl RunConfig {
    /// A config with defaults for everything except the repository list.
    pub fn new(repos: Vec<RepoId>) -> Self {
        Self {
            repos,
            author_name: default_author_name(),
            author_email: default_author_email(),
            base_branch: default_base_branch(),
            git_host: default_git_host(),
            api_url: default_api_url(),
            remote_url: None,
        }
    }

    /// Authenticated clone URL for `repo`.
    pub fn clone_url(&self, repo: &RepoId, token: &str) -> String {
        match &self.remote_url {
            Some(template) => template
                .replace("{repo}", repo.as_str())
                .replace("{token}", token),
            None => format!("https://{token}@{}/{}.git", self.git_host, repo),
        }
    }

    pub fn identity(&self) -> CommitIdentity {
        CommitIdentity {
            name: self.author_name.clone(),
            email: self.author_email.clone(),
        }
    }
}

/// Commit author identity, applied to each clone's local git config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Repository short-name → bag of facts, supplied to patch resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(pub Map<String, Value>);

impl Context {
    /// Facts for `repo`, looked up by short name first, then by full id.
    pub fn for_repo(&self, repo: &RepoId) -> Option<&Value> {
        self.0
            .get(repo.short_name())
            .or_else(|| self.0.get(repo.as_str()))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Per-repository invocation handed to a patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub repo: RepoId,
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// Patch descriptor
// ---------------------------------------------------------------------------

/// What a patch does to one repository. Produced once per repository per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchDescriptor {
    pub branch: String,
    #[serde(rename = "commit-message")]
    pub commit_message: String,
    #[serde(rename = "pr-title")]
    pub pr_title: String,
    #[serde(rename = "pr-body")]
    pub pr_body: String,
    #[serde(rename = "pr-labels", default)]
    pub pr_labels: BTreeSet<String>,
    #[serde(rename = "pr-assignees", default)]
    pub pr_assignees: BTreeSet<String>,
    #[serde(default)]
    pub scripts: Vec<String>,
    #[serde(default)]
    pub scripts_context: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Task results
// ---------------------------------------------------------------------------

/// Whether reconciliation opened a new pull request or refreshed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrAction {
    Created,
    Updated,
}

impl fmt::Display for PrAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrAction::Created => write!(f, "created"),
            PrAction::Updated => write!(f, "updated"),
        }
    }
}

/// Terminal state of one repository task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success {
        pr_number: u64,
        pr_url: String,
        pr_action: PrAction,
    },
    WouldChange,
    Error {
        error: String,
    },
}

/// Outcome of one repository's task, exactly one per configured repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub repo: RepoId,
    #[serde(flatten)]
    pub outcome: TaskOutcome,
    #[serde(rename = "result", default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<PatchDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

impl TaskResult {
    pub fn error(repo: RepoId, message: impl Into<String>) -> Self {
        Self {
            repo,
            outcome: TaskOutcome::Error {
                error: message.into(),
            },
            descriptor: None,
            diff: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Error { .. })
    }

    /// Error message, if this task failed.
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Error { error } => Some(error),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// History + status
// ---------------------------------------------------------------------------

/// Persisted memory of one pull request this tool opened or updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub repo: RepoId,
    pub pr_number: u64,
    pub pr_url: String,
    pub patch: String,
}

impl HistoryRecord {
    /// `"<repo>-<pr_number>"`, unique per store.
    pub fn key(&self) -> String {
        history_key(&self.repo, self.pr_number)
    }
}

pub fn history_key(repo: &RepoId, pr_number: u64) -> String {
    format!("{repo}-{pr_number}")
}

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrState::Open => write!(f, "OPEN"),
            PrState::Closed => write!(f, "CLOSED"),
            PrState::Merged => write!(f, "MERGED"),
        }
    }
}

/// Live state of a recorded pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrLiveStatus {
    pub state: PrState,
    pub reviews: usize,
    pub updated_at: DateTime<Utc>,
    /// `None` once merged, or while the forge is still computing it.
    pub mergeable: Option<bool>,
}

/// One line of the status report. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrStatusResult {
    pub key: String,
    pub record: HistoryRecord,
    #[serde(flatten)]
    pub outcome: PrStatusOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PrStatusOutcome {
    Live(PrLiveStatus),
    Failed { error: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_id_parts() {
        let repo = RepoId::from("nsx/sample-app");
        assert_eq!(repo.short_name(), "sample-app");
        assert_eq!(repo.owner(), "nsx");
        assert!(repo.is_well_formed());
    }

    #[test]
    fn malformed_repo_ids_are_rejected() {
        assert!(!RepoId::from("no-slash").is_well_formed());
        assert!(!RepoId::from("a/b/c").is_well_formed());
        assert!(!RepoId::from("/b").is_well_formed());
        assert!(!RepoId::from("a/").is_well_formed());
    }

    #[test]
    fn default_clone_url_embeds_token() {
        let config = RunConfig::new(vec![RepoId::from("org/a")]);
        assert_eq!(
            config.clone_url(&RepoId::from("org/a"), "t0k"),
            "https://t0k@github.com/org/a.git"
        );
    }

    #[test]
    fn remote_url_template_overrides_host() {
        let mut config = RunConfig::new(vec![]);
        config.remote_url = Some("file:///srv/git/{repo}.git".to_string());
        assert_eq!(
            config.clone_url(&RepoId::from("org/a"), "ignored"),
            "file:///srv/git/org/a.git"
        );
    }

    #[test]
    fn context_prefers_short_name() {
        let ctx: Context = serde_json::from_str(
            r#"{"a": {"team": "short"}, "org/a": {"team": "full"}, "org/b": {"team": "only-full"}}"#,
        )
        .unwrap();
        assert_eq!(ctx.for_repo(&RepoId::from("org/a")).unwrap()["team"], "short");
        assert_eq!(
            ctx.for_repo(&RepoId::from("org/b")).unwrap()["team"],
            "only-full"
        );
        assert!(ctx.for_repo(&RepoId::from("org/c")).is_none());
    }

    #[test]
    fn task_result_serializes_with_status_tag() {
        let result = TaskResult {
            repo: RepoId::from("org/a"),
            outcome: TaskOutcome::Success {
                pr_number: 7,
                pr_url: "https://github.com/org/a/pull/7".to_string(),
                pr_action: PrAction::Created,
            },
            descriptor: None,
            diff: Some("+x".to_string()),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["pr_number"], 7);
        assert_eq!(json["pr_action"], "created");
        assert_eq!(json["diff"], "+x");

        let err = TaskResult::error(RepoId::from("org/b"), "boom");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
        assert!(json.get("diff").is_none());
    }

    #[test]
    fn history_key_format() {
        let record = HistoryRecord {
            repo: RepoId::from("org/a"),
            pr_number: 12,
            pr_url: String::new(),
            patch: "p".to_string(),
        };
        assert_eq!(record.key(), "org/a-12");
    }

    #[test]
    fn pr_state_display_is_uppercase() {
        assert_eq!(PrState::Merged.to_string(), "MERGED");
        assert_eq!(
            serde_json::to_value(PrState::Open).unwrap(),
            serde_json::json!("OPEN")
        );
    }
}
