//! Dependency installation for node apps

use deckhand_core::{Error, Result};
use deckhand_logs::{AppLog, LogCapture};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::info;

/// Package manager, detected from the lockfile present in the project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Pnpm,
    Yarn,
    Npm,
}

impl PackageManager {
    /// Pick the manager by lockfile; npm is the fallback.
    pub fn detect(dir: &Path) -> Self {
        if dir.join("pnpm-lock.yaml").exists() {
            PackageManager::Pnpm
        } else if dir.join("yarn.lock").exists() {
            PackageManager::Yarn
        } else {
            PackageManager::Npm
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Npm => "npm",
        }
    }

    /// Production install arguments. npm prefers `ci` when a lockfile is
    /// committed.
    pub fn install_args(&self, dir: &Path) -> Vec<&'static str> {
        match self {
            PackageManager::Pnpm => vec!["install", "--prod"],
            PackageManager::Yarn => vec!["install", "--production"],
            PackageManager::Npm => {
                if dir.join("package-lock.json").exists() {
                    vec!["ci", "--omit=dev"]
                } else {
                    vec!["install", "--omit=dev"]
                }
            }
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Run the production install in `dir`, streaming its output into the
/// app's log. Inherits the caller's lifetime; no intrinsic timeout.
pub async fn install_dependencies(dir: &Path, log: Arc<AppLog>) -> Result<()> {
    let manager = PackageManager::detect(dir);

    which::which(manager.command())
        .map_err(|_| Error::InstallFailed(format!("{} not found in PATH", manager)))?;

    let args = manager.install_args(dir);
    info!(dir = %dir.display(), "running {} {}", manager, args.join(" "));

    let mut child = Command::new(manager.command())
        .args(&args)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::InstallFailed(format!("failed to start {}: {}", manager, e)))?;

    let (out, err) = LogCapture::spawn(log, child.stdout.take(), child.stderr.take());

    let status = child
        .wait()
        .await
        .map_err(|e| Error::InstallFailed(e.to_string()))?;

    if let Some(handle) = out {
        let _ = handle.await;
    }
    if let Some(handle) = err {
        let _ = handle.await;
    }

    if !status.success() {
        return Err(Error::InstallFailed(format!(
            "{} install exited with {:?}",
            manager,
            status.code()
        )));
    }
    Ok(())
}
