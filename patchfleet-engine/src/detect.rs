//! Change detector — did the scripts change anything?

use crate::error::ApplyError;
use crate::git::Git;

/// Stage everything (so new files count) and diff the index against `HEAD`.
///
/// Returns the unified diff, or [`ApplyError::NoChangeDetected`] when it is
/// empty: a patch that changes nothing usually means its preconditions did
/// not hold in this repository.
pub async fn detect_changes(git: &Git) -> Result<String, ApplyError> {
    git.run(&["add", "-A"]).await?;
    let diff = git
        .run(&["diff", "--cached", "--no-color", "--no-ext-diff", "HEAD"])
        .await?;
    if diff.trim().is_empty() {
        return Err(ApplyError::NoChangeDetected);
    }
    Ok(diff)
}
