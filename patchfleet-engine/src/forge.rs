//! Forge REST client — the pull-request half of reconciliation and status.
//!
//! [`Forge`] is the seam; [`GithubForge`] speaks the GitHub v3 API with a
//! blocking `ureq` agent, each call moved onto tokio's blocking pool so that
//! repository tasks keep making progress while one waits on the network.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use patchfleet_core::RepoId;

use crate::error::ForgeError;

const PAGE_SIZE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The fields of a pull request reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    /// Source branch name (`head.ref`).
    pub head_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPull {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// Live state of a single pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullDetails {
    pub number: u64,
    pub html_url: String,
    /// `true` for state `open`.
    pub open: bool,
    pub merged: bool,
    pub mergeable: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait Forge: Send + Sync {
    async fn list_open_pulls(&self, repo: &RepoId) -> Result<Vec<PullRequest>, ForgeError>;

    async fn create_pull(&self, repo: &RepoId, pull: &NewPull) -> Result<PullRequest, ForgeError>;

    async fn edit_pull(
        &self,
        repo: &RepoId,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, ForgeError>;

    async fn add_labels(&self, repo: &RepoId, number: u64, labels: &[String])
        -> Result<(), ForgeError>;

    async fn add_assignees(
        &self,
        repo: &RepoId,
        number: u64,
        assignees: &[String],
    ) -> Result<(), ForgeError>;

    async fn get_pull(&self, repo: &RepoId, number: u64) -> Result<PullDetails, ForgeError>;

    async fn count_reviews(&self, repo: &RepoId, number: u64) -> Result<usize, ForgeError>;
}

// ---------------------------------------------------------------------------
// GitHub wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GhPull {
    number: u64,
    html_url: String,
    state: String,
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    mergeable: Option<bool>,
    updated_at: DateTime<Utc>,
    head: GhRef,
}

#[derive(Debug, Deserialize)]
struct GhRef {
    #[serde(rename = "ref")]
    name: String,
}

impl From<GhPull> for PullRequest {
    fn from(pull: GhPull) -> Self {
        PullRequest {
            number: pull.number,
            html_url: pull.html_url,
            head_ref: pull.head.name,
        }
    }
}

impl From<GhPull> for PullDetails {
    fn from(pull: GhPull) -> Self {
        PullDetails {
            number: pull.number,
            html_url: pull.html_url,
            open: pull.state == "open",
            merged: pull.merged,
            mergeable: pull.mergeable,
            updated_at: pull.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// GithubForge
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct GithubForge {
    agent: ureq::Agent,
    api_url: String,
    token: String,
}

impl GithubForge {
    pub fn new(api_url: &str, token: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("patchfleet/", env!("CARGO_PKG_VERSION")))
            .build();
        GithubForge {
            agent,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Run a blocking request closure on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, ForgeError>
    where
        T: Send + 'static,
        F: FnOnce(&GithubForge) -> Result<T, ForgeError> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(&this))
            .await
            .map_err(|e| ForgeError::Join(e.to_string()))?
    }

    fn request(&self, method: &'static str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &format!("{}{}", self.api_url, path))
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("X-GitHub-Api-Version", "2022-11-28")
    }

    fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, ForgeError> {
        let mut request = self.request(method, path);
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        }
        .map_err(|e| map_ureq_error(method, path, e))?;
        response.into_json::<T>().map_err(|e| ForgeError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Fetch every page of a list endpoint.
    fn paginate<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ForgeError> {
        let mut items = Vec::new();
        for page in 1.. {
            let mut query = query.to_vec();
            query.push(("per_page", PAGE_SIZE.to_string()));
            query.push(("page", page.to_string()));
            let batch: Vec<T> = self.call("GET", path, &query, None)?;
            let short = batch.len() < PAGE_SIZE;
            items.extend(batch);
            if short {
                break;
            }
        }
        Ok(items)
    }
}

fn map_ureq_error(method: &'static str, path: &str, err: ureq::Error) -> ForgeError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            ForgeError::Status {
                method,
                path: path.to_string(),
                status,
                message,
            }
        }
        ureq::Error::Transport(transport) => ForgeError::Transport {
            method,
            path: path.to_string(),
            message: transport.to_string(),
        },
    }
}

#[async_trait]
impl Forge for GithubForge {
    async fn list_open_pulls(&self, repo: &RepoId) -> Result<Vec<PullRequest>, ForgeError> {
        let path = format!("/repos/{repo}/pulls");
        self.blocking(move |gh| {
            let pulls: Vec<GhPull> = gh.paginate(&path, &[("state", "open".to_string())])?;
            Ok(pulls.into_iter().map(PullRequest::from).collect())
        })
        .await
    }

    async fn create_pull(&self, repo: &RepoId, pull: &NewPull) -> Result<PullRequest, ForgeError> {
        let path = format!("/repos/{repo}/pulls");
        let body = json!({
            "title": pull.title,
            "body": pull.body,
            "head": pull.head,
            "base": pull.base,
            "maintainer_can_modify": true,
        });
        self.blocking(move |gh| {
            let created: GhPull = gh.call("POST", &path, &[], Some(body))?;
            Ok(created.into())
        })
        .await
    }

    async fn edit_pull(
        &self,
        repo: &RepoId,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, ForgeError> {
        let path = format!("/repos/{repo}/pulls/{number}");
        let body = json!({ "title": title, "body": body });
        self.blocking(move |gh| {
            let edited: GhPull = gh.call("PATCH", &path, &[], Some(body))?;
            Ok(edited.into())
        })
        .await
    }

    async fn add_labels(
        &self,
        repo: &RepoId,
        number: u64,
        labels: &[String],
    ) -> Result<(), ForgeError> {
        let path = format!("/repos/{repo}/issues/{number}/labels");
        let body = json!({ "labels": labels });
        self.blocking(move |gh| {
            let _: Value = gh.call("POST", &path, &[], Some(body))?;
            Ok(())
        })
        .await
    }

    async fn add_assignees(
        &self,
        repo: &RepoId,
        number: u64,
        assignees: &[String],
    ) -> Result<(), ForgeError> {
        let path = format!("/repos/{repo}/issues/{number}/assignees");
        let body = json!({ "assignees": assignees });
        self.blocking(move |gh| {
            let _: Value = gh.call("POST", &path, &[], Some(body))?;
            Ok(())
        })
        .await
    }

    async fn get_pull(&self, repo: &RepoId, number: u64) -> Result<PullDetails, ForgeError> {
        let path = format!("/repos/{repo}/pulls/{number}");
        self.blocking(move |gh| {
            let pull: GhPull = gh.call("GET", &path, &[], None)?;
            Ok(pull.into())
        })
        .await
    }

    async fn count_reviews(&self, repo: &RepoId, number: u64) -> Result<usize, ForgeError> {
        let path = format!("/repos/{repo}/pulls/{number}/reviews");
        self.blocking(move |gh| {
            let reviews: Vec<Value> = gh.paginate(&path, &[])?;
            Ok(reviews.len())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PULL_JSON: &str = r#"{
        "number": 42,
        "html_url": "https://github.com/org/a/pull/42",
        "state": "closed",
        "merged": true,
        "mergeable": null,
        "updated_at": "2024-05-01T12:00:00Z",
        "head": {"ref": "sre/add-team-metadata", "sha": "abc"},
        "title": "ignored"
    }"#;

    #[test]
    fn pull_json_maps_to_details() {
        let pull: GhPull = serde_json::from_str(PULL_JSON).unwrap();
        let details = PullDetails::from(pull);
        assert_eq!(details.number, 42);
        assert!(!details.open);
        assert!(details.merged);
        assert_eq!(details.mergeable, None);
    }

    #[test]
    fn pull_json_maps_to_summary() {
        let pull: GhPull = serde_json::from_str(PULL_JSON).unwrap();
        let summary = PullRequest::from(pull);
        assert_eq!(summary.head_ref, "sre/add-team-metadata");
    }

    #[test]
    fn list_payload_without_merged_flag_parses() {
        let pulls: Vec<GhPull> = serde_json::from_str(
            r#"[{"number": 1, "html_url": "u", "state": "open",
                 "updated_at": "2024-05-01T12:00:00Z", "head": {"ref": "b"}}]"#,
        )
        .unwrap();
        assert!(!pulls[0].merged);
    }

    #[test]
    fn api_url_trailing_slash_is_trimmed() {
        let gh = GithubForge::new("https://ghe.example.com/api/v3/", "t");
        assert_eq!(gh.api_url, "https://ghe.example.com/api/v3");
    }
}
