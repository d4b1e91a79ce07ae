//! Script runner — executes a descriptor's scripts inside a workspace.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::ApplyError;

/// Run each script with `sh -c`, in order, from `workdir`.
///
/// The environment is the current process environment with `overlay`
/// applied on top. The first nonzero exit stops the sequence.
pub async fn run_scripts(
    workdir: &Path,
    scripts: &[String],
    overlay: &BTreeMap<String, String>,
) -> Result<(), ApplyError> {
    for script in scripts {
        tracing::info!("running script: {script}");
        let output = Command::new("sh")
            .arg("-c")
            .arg(script)
            .current_dir(workdir)
            .envs(overlay)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ApplyError::Io {
                path: workdir.to_path_buf(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            tracing::debug!("[{script}] stdout:\n{}", stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            tracing::debug!("[{script}] stderr:\n{}", stderr.trim_end());
        }

        if !output.status.success() {
            return Err(ApplyError::Script {
                command: script.clone(),
                exit_code: output.status.code(),
            });
        }
    }
    Ok(())
}
