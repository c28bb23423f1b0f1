//! Project classification
//!
//! Decides what kind of app an extracted tree is and how to start it.

use deckhand_core::{constants, AppKind, Error, Result, StartSpec};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::install::PackageManager;

/// Classifier output: kind, the real project root, and (for node apps)
/// the start spec. Static apps get their start spec once a port is known.
#[derive(Debug, Clone)]
pub struct Classification {
    pub kind: AppKind,
    pub root: PathBuf,
    pub start_spec: Option<StartSpec>,
}

/// Classify the project under `dir`.
pub fn classify(dir: &Path) -> Result<Classification> {
    let root = find_real_root(dir)?;

    if root.join("package.json").exists() {
        let start_spec = node_start_spec(&root)?;
        debug!(root = %root.display(), spec = %start_spec.display(), "classified as node");
        return Ok(Classification {
            kind: AppKind::Node,
            root,
            start_spec: Some(start_spec),
        });
    }

    if root.join("index.html").exists() {
        debug!(root = %root.display(), "classified as static");
        return Ok(Classification {
            kind: AppKind::Static,
            root,
            start_spec: None,
        });
    }

    Err(Error::UnclassifiableProject(root))
}

/// Descend through wrapper directories: archives commonly contain a single
/// top-level folder (plus packaging junk) around the actual project.
fn find_real_root(dir: &Path) -> Result<PathBuf> {
    let mut current = dir.to_path_buf();
    loop {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if constants::JUNK_ENTRIES.contains(&name.as_str()) {
                continue;
            }
            entries.push(entry);
        }
        if entries.len() == 1 && entries[0].file_type()?.is_dir() {
            current = entries[0].path();
        } else {
            return Ok(current);
        }
    }
}

/// Derive the start spec from `package.json`. A `start` script of the
/// exact shape `node <file>` spawns the interpreter directly; everything
/// else falls through to the package manager's `start` command.
fn node_start_spec(root: &Path) -> Result<StartSpec> {
    let raw = fs::read_to_string(root.join("package.json"))?;
    let manifest: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|_| Error::UnclassifiableProject(root.to_path_buf()))?;

    if let Some(script) = manifest
        .get("scripts")
        .and_then(|s| s.get("start"))
        .and_then(|s| s.as_str())
    {
        let parts: Vec<&str> = script.split_whitespace().collect();
        if parts.len() == 2 && parts[0] == "node" {
            return Ok(StartSpec::new("node", vec![parts[1].to_string()]));
        }
    }

    let manager = PackageManager::detect(root);
    Ok(StartSpec::new(
        manager.command(),
        vec!["run".to_string(), "start".to_string()],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_static_project() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.html", "<h1>hi</h1>");

        let c = classify(dir.path()).unwrap();
        assert_eq!(c.kind, AppKind::Static);
        assert_eq!(c.root, dir.path());
        assert!(c.start_spec.is_none());
    }

    #[test]
    fn test_node_direct_start_script() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "package.json",
            r#"{"scripts":{"start":"node server.js"}}"#,
        );
        write(dir.path(), "server.js", "// server");

        let c = classify(dir.path()).unwrap();
        assert_eq!(c.kind, AppKind::Node);
        let spec = c.start_spec.unwrap();
        assert_eq!(spec.command, "node");
        assert_eq!(spec.args, vec!["server.js".to_string()]);
    }

    #[test]
    fn test_node_shell_script_falls_back() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "package.json",
            r#"{"scripts":{"start":"NODE_ENV=production node server.js"}}"#,
        );

        let c = classify(dir.path()).unwrap();
        let spec = c.start_spec.unwrap();
        assert_eq!(spec.command, "npm");
        assert_eq!(spec.args, vec!["run".to_string(), "start".to_string()]);
    }

    #[test]
    fn test_node_no_start_script_falls_back() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "package.json", r#"{"name":"x"}"#);

        let c = classify(dir.path()).unwrap();
        assert_eq!(c.kind, AppKind::Node);
        assert_eq!(c.start_spec.unwrap().command, "npm");
    }

    #[test]
    fn test_lockfile_selects_manager() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "package.json", r#"{"scripts":{"start":"next start"}}"#);
        write(dir.path(), "pnpm-lock.yaml", "lockfileVersion: 9");

        let c = classify(dir.path()).unwrap();
        assert_eq!(c.start_spec.unwrap().command, "pnpm");
    }

    #[test]
    fn test_descends_wrapper_directory() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "my-site-main/index.html", "<h1>hi</h1>");
        fs::create_dir_all(dir.path().join("__MACOSX")).unwrap();
        write(dir.path(), ".DS_Store", "");

        let c = classify(dir.path()).unwrap();
        assert_eq!(c.kind, AppKind::Static);
        assert_eq!(c.root, dir.path().join("my-site-main"));
    }

    #[test]
    fn test_no_descent_past_real_root() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.html", "<h1>hi</h1>");
        write(dir.path(), "sub/other.html", "");

        let c = classify(dir.path()).unwrap();
        assert_eq!(c.root, dir.path());
    }

    #[test]
    fn test_unclassifiable() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "README.md", "nothing to run");

        let err = classify(dir.path()).unwrap_err();
        assert!(matches!(err, Error::UnclassifiableProject(_)));
    }

    #[test]
    fn test_manifest_beats_index_html() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "package.json",
            r#"{"scripts":{"start":"node app.js"}}"#,
        );
        write(dir.path(), "index.html", "<h1>hi</h1>");

        let c = classify(dir.path()).unwrap();
        assert_eq!(c.kind, AppKind::Node);
    }
}
