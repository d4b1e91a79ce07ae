//! Workspace provisioner — one disposable clone per repository task.
//!
//! A [`Workspace`] owns its temporary directory. [`Workspace::release`]
//! removes it explicitly; if a task bails out any other way (error, panic
//! unwind) the directory is removed when the workspace is dropped.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use patchfleet_core::{CommitIdentity, RepoId};

use crate::error::ApplyError;
use crate::git::Git;

/// Prefix for every workspace directory under the system temp dir.
pub const WORKSPACE_PREFIX: &str = "patchfleet-";

pub struct Workspace {
    repo: RepoId,
    root: TempDir,
    checkout: PathBuf,
}

impl Workspace {
    /// Clone `clone_url` into a fresh temp directory and set the local
    /// commit identity. The global git config is never touched.
    pub async fn provision(
        repo: &RepoId,
        clone_url: &str,
        identity: &CommitIdentity,
    ) -> Result<Self, ApplyError> {
        let root = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()
            .map_err(|source| ApplyError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        Self::provision_in(root, repo, clone_url, identity).await
    }

    /// Like [`provision`](Self::provision), into a caller-supplied directory.
    pub async fn provision_in(
        root: TempDir,
        repo: &RepoId,
        clone_url: &str,
        identity: &CommitIdentity,
    ) -> Result<Self, ApplyError> {
        let checkout = root.path().join(repo.short_name());
        tracing::info!("cloning {repo}");
        Git::new(root.path())
            .run(&["clone", "--quiet", clone_url, repo.short_name()])
            .await
            .map_err(|source| ApplyError::Clone {
                repo: repo.to_string(),
                source,
            })?;

        let git = Git::new(&checkout);
        git.run(&["config", "--local", "user.name", &identity.name])
            .await?;
        git.run(&["config", "--local", "user.email", &identity.email])
            .await?;

        Ok(Workspace {
            repo: repo.clone(),
            root,
            checkout,
        })
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// Root of the cloned working tree.
    pub fn path(&self) -> &Path {
        &self.checkout
    }

    /// Temp directory holding the clone; removed on release.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn git(&self) -> Git {
        Git::new(&self.checkout)
    }

    /// Remove the workspace directory. Failure is logged, never fatal.
    pub async fn release(self) {
        let repo = self.repo;
        let root = self.root;
        let path = root.path().to_path_buf();
        match tokio::task::spawn_blocking(move || root.close()).await {
            Ok(Ok(())) => tracing::debug!("removed workspace {}", path.display()),
            Ok(Err(e)) => tracing::warn!("failed to remove workspace for {repo} at {}: {e}", path.display()),
            Err(e) => tracing::warn!("workspace cleanup for {repo} aborted: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bare_remote, identity};

    #[tokio::test]
    async fn provision_clones_and_sets_local_identity() {
        let remotes = TempDir::new().unwrap();
        let repo = RepoId::from("org/app");
        let url = bare_remote(remotes.path(), &repo, &[("README.md", "hello\n")]);

        let ws = Workspace::provision(&repo, &url, &identity()).await.expect("provision");
        assert!(ws.path().join("README.md").exists());
        let name = ws.git().run(&["config", "--local", "user.name"]).await.unwrap();
        assert_eq!(name.trim(), "Fleet Bot");

        let root = ws.root().to_path_buf();
        ws.release().await;
        assert!(!root.exists(), "release must remove the workspace");
    }

    #[tokio::test]
    async fn failed_clone_is_a_clone_error_and_leaves_nothing() {
        let parent = TempDir::new().unwrap();
        let root = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent.path())
            .unwrap();
        let root_path = root.path().to_path_buf();
        let repo = RepoId::from("org/missing");
        let url = format!("file://{}/nowhere.git", parent.path().display());

        let err = Workspace::provision_in(root, &repo, &url, &identity())
            .await
            .err()
            .expect("clone must fail");
        assert!(matches!(err, ApplyError::Clone { .. }), "got: {err}");
        assert!(!root_path.exists(), "failed clone must not leak its directory");
    }
}
