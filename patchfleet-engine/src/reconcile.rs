//! Branch and pull-request reconciliation.
//!
//! Both steps are create-or-update and safe to repeat: re-running the same
//! patch against a repository whose branch and pull request already exist
//! leaves one branch and one pull request, refreshed in place.

use patchfleet_core::{PatchDescriptor, PrAction, RepoId};

use crate::error::ApplyError;
use crate::forge::{Forge, NewPull};
use crate::git::Git;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchOutcome {
    /// The branch already existed on the remote before this run.
    pub existed: bool,
    /// A new commit was made. `false` when the branch already held the change.
    pub committed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOutcome {
    pub number: u64,
    pub url: String,
    pub action: PrAction,
}

/// Check out (or create) `descriptor.branch`, commit the staged change and
/// force-push it to `origin`.
pub async fn reconcile_branch(
    git: &Git,
    descriptor: &PatchDescriptor,
) -> Result<BranchOutcome, ApplyError> {
    let branch = descriptor.branch.as_str();

    let existed = git
        .succeeds(&["ls-remote", "--quiet", "--exit-code", "--heads", "origin", branch])
        .await;
    let tracking = existed && git.succeeds(&["checkout", "--quiet", branch]).await;
    if tracking {
        tracing::debug!("checked out existing branch {branch}");
        if !git
            .succeeds(&["pull", "--quiet", "--ff-only", "origin", branch])
            .await
        {
            tracing::debug!("pull of {branch} skipped; local changes take precedence");
        }
    } else {
        git.run(&["checkout", "--quiet", "-b", branch]).await?;
        if existed {
            // The staged change conflicts with the remote branch; the force
            // push below replaces it.
            tracing::debug!("rebuilt {branch} from the base branch");
        } else {
            tracing::debug!("created branch {branch}");
        }
    }

    git.run(&["add", "-A"]).await?;
    let nothing_staged = git.succeeds(&["diff", "--cached", "--quiet"]).await;
    if !nothing_staged {
        git.run(&["commit", "--quiet", "-m", &descriptor.commit_message])
            .await?;
    }

    git.run(&["push", "--quiet", "--force", "origin", branch])
        .await?;
    tracing::info!(
        "pushed {branch} ({})",
        if existed { "existing branch" } else { "new branch" }
    );

    Ok(BranchOutcome {
        existed,
        committed: !nothing_staged,
    })
}

/// Update the open pull request whose head is `descriptor.branch`, or open a
/// new one against `base`. Labels and assignees are added either way.
pub async fn reconcile_pull(
    forge: &dyn Forge,
    repo: &RepoId,
    base: &str,
    descriptor: &PatchDescriptor,
) -> Result<PullOutcome, ApplyError> {
    let open = forge.list_open_pulls(repo).await?;
    let existing = open.into_iter().find(|pr| pr.head_ref == descriptor.branch);

    let (pull, action) = match existing {
        Some(pr) => {
            let pull = forge
                .edit_pull(repo, pr.number, &descriptor.pr_title, &descriptor.pr_body)
                .await?;
            (pull, PrAction::Updated)
        }
        None => {
            let pull = forge
                .create_pull(
                    repo,
                    &NewPull {
                        title: descriptor.pr_title.clone(),
                        body: descriptor.pr_body.clone(),
                        head: descriptor.branch.clone(),
                        base: base.to_string(),
                    },
                )
                .await?;
            (pull, PrAction::Created)
        }
    };

    if !descriptor.pr_labels.is_empty() {
        let labels: Vec<String> = descriptor.pr_labels.iter().cloned().collect();
        forge.add_labels(repo, pull.number, &labels).await?;
    }
    if !descriptor.pr_assignees.is_empty() {
        let assignees: Vec<String> = descriptor.pr_assignees.iter().cloned().collect();
        forge.add_assignees(repo, pull.number, &assignees).await?;
    }

    tracing::info!("PR #{} {action}: {}", pull.number, pull.html_url);
    Ok(PullOutcome {
        number: pull.number,
        url: pull.html_url,
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryForge;
    use crate::test_support::{bare_remote, identity};
    use crate::workspace::Workspace;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn descriptor(branch: &str) -> PatchDescriptor {
        PatchDescriptor {
            branch: branch.to_string(),
            commit_message: "chore: add marker".to_string(),
            pr_title: "Add marker".to_string(),
            pr_body: "body".to_string(),
            pr_labels: BTreeSet::from(["sre".to_string()]),
            pr_assignees: BTreeSet::from(["alice".to_string()]),
            scripts: vec![],
            scripts_context: Default::default(),
        }
    }

    #[tokio::test]
    async fn new_pull_is_created_against_base() {
        let forge = MemoryForge::new();
        let repo = RepoId::from("org/a");
        let out = reconcile_pull(&forge, &repo, "main", &descriptor("bot/x"))
            .await
            .unwrap();
        assert_eq!(out.action, PrAction::Created);
        assert_eq!(out.number, 1);

        let pulls = forge.pulls(&repo);
        assert_eq!(pulls.len(), 1);
        assert_eq!(pulls[0].base, "main");
        assert!(pulls[0].labels.contains("sre"));
        assert!(pulls[0].assignees.contains("alice"));
    }

    #[tokio::test]
    async fn open_pull_with_same_head_is_updated_in_place() {
        let forge = MemoryForge::new();
        let repo = RepoId::from("org/a");
        let number = forge.seed_pull(&repo, "bot/x", "old title");

        let out = reconcile_pull(&forge, &repo, "main", &descriptor("bot/x"))
            .await
            .unwrap();
        assert_eq!(out.action, PrAction::Updated);
        assert_eq!(out.number, number);

        let again = reconcile_pull(&forge, &repo, "main", &descriptor("bot/x"))
            .await
            .unwrap();
        assert_eq!(again.number, number);

        let pulls = forge.pulls(&repo);
        assert_eq!(pulls.len(), 1, "no second PR");
        assert_eq!(pulls[0].title, "Add marker");
    }

    #[tokio::test]
    async fn closed_pull_with_same_head_is_not_reused() {
        let forge = MemoryForge::new();
        let repo = RepoId::from("org/a");
        let old = forge.seed_pull(&repo, "bot/x", "old");
        forge.close(&repo, old);

        let out = reconcile_pull(&forge, &repo, "main", &descriptor("bot/x"))
            .await
            .unwrap();
        assert_eq!(out.action, PrAction::Created);
        assert_ne!(out.number, old);
    }

    #[tokio::test]
    async fn forge_failure_is_a_git_ops_error() {
        let forge = MemoryForge::new();
        let repo = RepoId::from("org/a");
        forge.fail_repo(&repo);
        let err = reconcile_pull(&forge, &repo, "main", &descriptor("bot/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::GitOps(_)), "got: {err}");
    }

    #[tokio::test]
    async fn branch_is_created_then_reused() {
        let remotes = TempDir::new().unwrap();
        let repo = RepoId::from("org/a");
        let url = bare_remote(remotes.path(), &repo, &[("README.md", "hi\n")]);
        let d = descriptor("bot/marker");

        let ws = Workspace::provision(&repo, &url, &identity()).await.unwrap();
        std::fs::write(ws.path().join("marker.txt"), "x\n").unwrap();
        let first = reconcile_branch(&ws.git(), &d).await.unwrap();
        assert!(!first.existed);
        assert!(first.committed);
        ws.release().await;

        // Same change again: the branch exists and already holds it.
        let ws = Workspace::provision(&repo, &url, &identity()).await.unwrap();
        std::fs::write(ws.path().join("marker.txt"), "x\n").unwrap();
        ws.git().run(&["add", "-A"]).await.unwrap();
        let second = reconcile_branch(&ws.git(), &d).await.unwrap();
        assert!(second.existed);
        assert!(!second.committed);

        let log = ws
            .git()
            .run(&["log", "--format=%s", "origin/bot/marker"])
            .await
            .unwrap();
        assert_eq!(log.lines().filter(|l| *l == "chore: add marker").count(), 1);
        ws.release().await;
    }

    #[tokio::test]
    async fn conflicting_change_rebuilds_an_existing_branch() {
        let remotes = TempDir::new().unwrap();
        let repo = RepoId::from("org/a");
        let url = bare_remote(remotes.path(), &repo, &[("README.md", "hi\n")]);
        let d = descriptor("bot/marker");

        let ws = Workspace::provision(&repo, &url, &identity()).await.unwrap();
        std::fs::write(ws.path().join("marker.txt"), "old\n").unwrap();
        reconcile_branch(&ws.git(), &d).await.unwrap();
        ws.release().await;

        // The staged file differs from the branch's copy, so checkout refuses.
        let ws = Workspace::provision(&repo, &url, &identity()).await.unwrap();
        std::fs::write(ws.path().join("marker.txt"), "new\n").unwrap();
        ws.git().run(&["add", "-A"]).await.unwrap();
        let out = reconcile_branch(&ws.git(), &d).await.unwrap();
        assert!(out.existed, "branch exists on origin");
        assert!(out.committed);

        let log = ws
            .git()
            .run(&["log", "--format=%s", "origin/bot/marker"])
            .await
            .unwrap();
        assert_eq!(log.lines().collect::<Vec<_>>(), vec!["chore: add marker", "initial"]);
        let content = ws
            .git()
            .run(&["show", "origin/bot/marker:marker.txt"])
            .await
            .unwrap();
        assert_eq!(content, "new\n");
        ws.release().await;
    }
}
