//! Safe archive extraction
//!
//! Application archives are gzip-compressed tarballs. Every entry path is
//! re-joined component by component under the destination; anything that
//! would land outside it is rejected before a single byte is written for
//! that entry. Callers remove the destination on failure, so a rejected
//! archive leaves no partial state behind.

use deckhand_core::{Error, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use tar::EntryType;
use tracing::debug;

/// Unpack archive bytes into `dest`.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;

    let decoder = GzDecoder::new(Cursor::new(bytes));
    let mut archive = tar::Archive::new(decoder);

    let entries = archive
        .entries()
        .map_err(|e| Error::ExtractionFailed(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| Error::ExtractionFailed(e.to_string()))?;
        let raw_path = entry
            .path()
            .map_err(|e| Error::ExtractionFailed(e.to_string()))?
            .into_owned();

        let target = safe_join(dest, &raw_path)?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target)?;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut file = fs::File::create(&target)?;
                std::io::copy(&mut entry, &mut file)?;
            }
            EntryType::Symlink | EntryType::Link => {
                return Err(Error::ExtractionFailed(format!(
                    "link entries are not allowed: {}",
                    raw_path.display()
                )));
            }
            EntryType::Block | EntryType::Char | EntryType::Fifo => {
                return Err(Error::ExtractionFailed(format!(
                    "device entries are not allowed: {}",
                    raw_path.display()
                )));
            }
            other => {
                debug!(entry_type = ?other, path = %raw_path.display(), "skipping tar entry");
            }
        }
    }

    // dependency install always starts from a clean slate
    remove_node_modules(dest)?;

    Ok(())
}

/// Join an entry path under `root`, rejecting anything that would resolve
/// outside it. Leading `/` is treated as relative to the root; `..` is a
/// traversal attempt and is refused outright.
fn safe_join(root: &Path, path: &Path) -> Result<PathBuf> {
    let mut result = root.to_path_buf();
    for component in path.components() {
        match component {
            Component::Normal(p) => result.push(p),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(Error::UnsafeArchivePath(path.display().to_string()));
            }
        }
    }
    if !result.starts_with(root) {
        return Err(Error::UnsafeArchivePath(path.display().to_string()));
    }
    Ok(result)
}

/// Delete any `node_modules` tree shipped inside the archive.
fn remove_node_modules(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if entry.file_name() == "node_modules" {
            debug!(path = %path.display(), "removing bundled node_modules");
            fs::remove_dir_all(&path)?;
        } else {
            remove_node_modules(&path)?;
        }
    }
    Ok(())
}
