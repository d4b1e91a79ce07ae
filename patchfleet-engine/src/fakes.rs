//! In-memory [`Forge`] (testing only).
//!
//! `MemoryForge` keeps pull requests per repository, records every call, and
//! can be told to fail all calls for a repository.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use patchfleet_core::{PrState, RepoId};

use crate::error::ForgeError;
use crate::forge::{Forge, NewPull, PullDetails, PullRequest};

/// A pull request as stored by [`MemoryForge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakePull {
    pub number: u64,
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
    pub labels: BTreeSet<String>,
    pub assignees: BTreeSet<String>,
    pub state: PrState,
    pub reviews: usize,
    pub mergeable: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

impl FakePull {
    fn summary(&self, repo: &RepoId) -> PullRequest {
        PullRequest {
            number: self.number,
            html_url: pull_url(repo, self.number),
            head_ref: self.head.clone(),
        }
    }
}

pub fn pull_url(repo: &RepoId, number: u64) -> String {
    format!("https://github.com/{repo}/pull/{number}")
}

#[derive(Debug, Default)]
struct State {
    pulls: BTreeMap<RepoId, Vec<FakePull>>,
    calls: Vec<String>,
    failing: HashSet<RepoId>,
}

#[derive(Debug, Default)]
pub struct MemoryForge {
    state: Mutex<State>,
}

impl MemoryForge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an open pull request for `head` and return its number.
    pub fn seed_pull(&self, repo: &RepoId, head: &str, title: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        insert_pull(
            &mut state,
            repo,
            &NewPull {
                title: title.to_string(),
                body: String::new(),
                head: head.to_string(),
                base: "main".to_string(),
            },
        )
        .number
    }

    /// Every pull request for `repo`, in creation order.
    pub fn pulls(&self, repo: &RepoId) -> Vec<FakePull> {
        let state = self.state.lock().unwrap();
        state.pulls.get(repo).cloned().unwrap_or_default()
    }

    /// Call log, `"<method> <repo>"` per call.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Make every subsequent call for `repo` fail with HTTP 500.
    pub fn fail_repo(&self, repo: &RepoId) {
        self.state.lock().unwrap().failing.insert(repo.clone());
    }

    pub fn merge(&self, repo: &RepoId, number: u64) {
        self.update(repo, number, |pull| {
            pull.state = PrState::Merged;
            pull.mergeable = None;
        });
    }

    pub fn close(&self, repo: &RepoId, number: u64) {
        self.update(repo, number, |pull| pull.state = PrState::Closed);
    }

    pub fn add_review(&self, repo: &RepoId, number: u64) {
        self.update(repo, number, |pull| pull.reviews += 1);
    }

    fn update(&self, repo: &RepoId, number: u64, f: impl FnOnce(&mut FakePull)) {
        let mut state = self.state.lock().unwrap();
        if let Some(pull) = find_mut(&mut state, repo, number) {
            f(pull);
            pull.updated_at = Utc::now();
        }
    }

    /// Record the call and apply failure injection.
    fn enter(&self, method: &'static str, repo: &RepoId) -> Result<(), ForgeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{method} {repo}"));
        if state.failing.contains(repo) {
            return Err(ForgeError::Status {
                method: "GET",
                path: format!("/repos/{repo}"),
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

fn insert_pull<'a>(state: &'a mut State, repo: &RepoId, pull: &NewPull) -> &'a FakePull {
    let pulls = state.pulls.entry(repo.clone()).or_default();
    let number = pulls.len() as u64 + 1;
    pulls.push(FakePull {
        number,
        head: pull.head.clone(),
        base: pull.base.clone(),
        title: pull.title.clone(),
        body: pull.body.clone(),
        labels: BTreeSet::new(),
        assignees: BTreeSet::new(),
        state: PrState::Open,
        reviews: 0,
        mergeable: Some(true),
        updated_at: Utc::now(),
    });
    &pulls[pulls.len() - 1]
}

fn find_mut<'a>(state: &'a mut State, repo: &RepoId, number: u64) -> Option<&'a mut FakePull> {
    state
        .pulls
        .get_mut(repo)
        .and_then(|pulls| pulls.iter_mut().find(|p| p.number == number))
}

fn not_found(repo: &RepoId, number: u64) -> ForgeError {
    ForgeError::Status {
        method: "GET",
        path: format!("/repos/{repo}/pulls/{number}"),
        status: 404,
        message: "Not Found".to_string(),
    }
}

#[async_trait]
impl Forge for MemoryForge {
    async fn list_open_pulls(&self, repo: &RepoId) -> Result<Vec<PullRequest>, ForgeError> {
        self.enter("list_open_pulls", repo)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .pulls
            .get(repo)
            .map(|pulls| {
                pulls
                    .iter()
                    .filter(|p| p.state == PrState::Open)
                    .map(|p| p.summary(repo))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_pull(&self, repo: &RepoId, pull: &NewPull) -> Result<PullRequest, ForgeError> {
        self.enter("create_pull", repo)?;
        let mut state = self.state.lock().unwrap();
        Ok(insert_pull(&mut state, repo, pull).summary(repo))
    }

    async fn edit_pull(
        &self,
        repo: &RepoId,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, ForgeError> {
        self.enter("edit_pull", repo)?;
        let mut state = self.state.lock().unwrap();
        let pull = find_mut(&mut state, repo, number).ok_or_else(|| not_found(repo, number))?;
        pull.title = title.to_string();
        pull.body = body.to_string();
        pull.updated_at = Utc::now();
        Ok(pull.summary(repo))
    }

    async fn add_labels(
        &self,
        repo: &RepoId,
        number: u64,
        labels: &[String],
    ) -> Result<(), ForgeError> {
        self.enter("add_labels", repo)?;
        let mut state = self.state.lock().unwrap();
        let pull = find_mut(&mut state, repo, number).ok_or_else(|| not_found(repo, number))?;
        pull.labels.extend(labels.iter().cloned());
        Ok(())
    }

    async fn add_assignees(
        &self,
        repo: &RepoId,
        number: u64,
        assignees: &[String],
    ) -> Result<(), ForgeError> {
        self.enter("add_assignees", repo)?;
        let mut state = self.state.lock().unwrap();
        let pull = find_mut(&mut state, repo, number).ok_or_else(|| not_found(repo, number))?;
        pull.assignees.extend(assignees.iter().cloned());
        Ok(())
    }

    async fn get_pull(&self, repo: &RepoId, number: u64) -> Result<PullDetails, ForgeError> {
        self.enter("get_pull", repo)?;
        let mut state = self.state.lock().unwrap();
        let pull = find_mut(&mut state, repo, number).ok_or_else(|| not_found(repo, number))?;
        Ok(PullDetails {
            number: pull.number,
            html_url: pull_url(repo, pull.number),
            open: pull.state == PrState::Open,
            merged: pull.state == PrState::Merged,
            mergeable: pull.mergeable,
            updated_at: pull.updated_at,
        })
    }

    async fn count_reviews(&self, repo: &RepoId, number: u64) -> Result<usize, ForgeError> {
        self.enter("count_reviews", repo)?;
        let mut state = self.state.lock().unwrap();
        let pull = find_mut(&mut state, repo, number).ok_or_else(|| not_found(repo, number))?;
        Ok(pull.reviews)
    }
}
