//! Version snapshots and rollback restore

use chrono::Utc;
use deckhand_core::{constants, DeployMethod, Error, GitSource, Result, Version};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Per-app store of immutable working-directory snapshots
pub struct VersionStore {
    versions_dir: PathBuf,
}

impl VersionStore {
    pub fn new(versions_dir: PathBuf) -> Self {
        Self { versions_dir }
    }

    /// Snapshot the working directory into a fresh version directory.
    /// `.git`, dependency caches, and the versions tree itself are skipped.
    pub fn snapshot(
        &self,
        workdir: &Path,
        method: DeployMethod,
        source: Option<GitSource>,
    ) -> Result<Version> {
        fs::create_dir_all(&self.versions_dir)?;

        // millis timestamps sort lexically; bump on collision
        let mut millis = Utc::now().timestamp_millis();
        let (id, snapshot_dir) = loop {
            let id = format!("v{}", millis);
            let dir = self.versions_dir.join(&id);
            if !dir.exists() {
                break (id, dir);
            }
            millis += 1;
        };

        copy_dir_recursive(workdir, &snapshot_dir, constants::SNAPSHOT_SKIP)?;
        info!(id, dir = %snapshot_dir.display(), "created version snapshot");

        Ok(Version {
            id,
            created_at: Utc::now(),
            method,
            source,
            snapshot_dir,
        })
    }

    /// Replace the working directory contents with a snapshot. Generated
    /// artifacts (dependency caches, `.git`, the versions tree) are left
    /// in place.
    pub fn restore(&self, version: &Version, workdir: &Path) -> Result<()> {
        if !version.snapshot_dir.exists() {
            return Err(Error::VersionMissing(version.id.clone()));
        }

        clear_dir(workdir, constants::SNAPSHOT_SKIP)?;
        copy_dir_recursive(&version.snapshot_dir, workdir, &[])?;
        info!(id = %version.id, dir = %workdir.display(), "restored snapshot");
        Ok(())
    }
}

/// Recursively copy `src` into `dst`, skipping entries named in `skip`
/// at any depth. Symlinks are not followed.
pub fn copy_dir_recursive(src: &Path, dst: &Path, skip: &[&str]) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if skip
            .iter()
            .any(|s| name.to_string_lossy().as_ref() == *s)
        {
            continue;
        }
        let file_type = entry.file_type()?;
        let target = dst.join(&name);
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &target, skip)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
        } else {
            debug!(path = %entry.path().display(), "skipping non-regular entry");
        }
    }
    Ok(())
}

/// Remove everything in `dir` except entries named in `keep`.
fn clear_dir(dir: &Path, keep: &[&str]) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if keep
            .iter()
            .any(|s| name.to_string_lossy().as_ref() == *s)
        {
            continue;
        }
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
