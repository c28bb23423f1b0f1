//! Git operations, via the git binary

use deckhand_core::{Error, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::info;

/// Shallow-clone `branch` of `url` into `dest`.
pub async fn clone_shallow(url: &str, branch: Option<&str>, dest: &Path) -> Result<()> {
    info!(url, ?branch, dest = %dest.display(), "cloning repository");

    let mut args: Vec<&str> = vec!["clone", "--depth", "1"];
    if let Some(b) = branch {
        args.push("--branch");
        args.push(b);
    }
    args.push(url);
    let dest_str = dest.to_string_lossy();
    args.push(&dest_str);

    let output = Command::new("git")
        .args(&args)
        .output()
        .await
        .map_err(|e| Error::CloneFailed(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CloneFailed(stderr.trim().to_string()));
    }
    Ok(())
}

/// Fast-forward `dir` to the latest commit on `branch`.
pub async fn pull(dir: &Path, branch: &str) -> Result<()> {
    info!(dir = %dir.display(), branch, "pulling latest");

    let output = Command::new("git")
        .args(["pull", "--ff-only", "origin", branch])
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| Error::CloneFailed(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CloneFailed(stderr.trim().to_string()));
    }
    Ok(())
}

/// Short commit id of HEAD in `dir`.
pub async fn short_commit(dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| Error::CloneFailed(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CloneFailed(stderr.trim().to_string()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// The branch currently checked out in `dir`. Used when a deploy did not
/// name a branch explicitly.
pub async fn current_branch(dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| Error::CloneFailed(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CloneFailed(stderr.trim().to_string()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
