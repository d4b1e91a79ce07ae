//! Local git fixtures for unit tests: seeded repositories and bare remotes.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use patchfleet_core::{CommitIdentity, RepoId};

pub(crate) fn identity() -> CommitIdentity {
    CommitIdentity {
        name: "Fleet Bot".to_string(),
        email: "fleet-bot@example.com".to_string(),
    }
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=Seed", "-c", "user.email=seed@example.com"])
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("spawn git");
    assert!(
        status.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&status.stderr)
    );
}

fn seed(dir: &Path, files: &[(&str, &str)]) {
    git(dir, &["init", "-q"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    for (path, content) in files {
        let full = dir.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "--allow-empty", "-m", "initial"]);
}

/// A working repository on `main` with one commit containing `files`.
pub(crate) fn init_repo(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    seed(dir.path(), files);
    dir
}

/// Create `<dir>/<owner>/<name>.git` as a bare remote seeded with `files`
/// and return its `file://` URL.
pub(crate) fn bare_remote(dir: &Path, repo: &RepoId, files: &[(&str, &str)]) -> String {
    let work = init_repo(files);
    let bare = dir.join(format!("{repo}.git"));
    std::fs::create_dir_all(bare.parent().unwrap()).unwrap();
    git(
        dir,
        &[
            "clone",
            "-q",
            "--bare",
            work.path().to_str().unwrap(),
            bare.to_str().unwrap(),
        ],
    );
    format!("file://{}", bare.display())
}
