//! Deckhand Registry - the persisted source of truth for deployed apps
//!
//! A single JSON document holds every app record. Writes are atomic
//! (serialize to a sibling temp file, rename over the target) and reads
//! always parse the current file contents, so there is no long-lived
//! in-memory cache that can diverge. All mutations go through one write
//! lock; readers take the read lock and may overlap.

use deckhand_core::{App, Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The registry document as persisted on disk
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegistryDoc {
    #[serde(default)]
    pub apps: BTreeMap<String, App>,
}

/// Handle to the registry document
pub struct Registry {
    path: PathBuf,
    lock: RwLock<()>,
}

impl Registry {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the current document. A missing file is an empty registry.
    pub fn load(&self) -> Result<RegistryDoc> {
        let _guard = self.lock.read();
        self.read_doc()
    }

    /// All registered apps.
    pub fn list(&self) -> Result<Vec<App>> {
        Ok(self.load()?.apps.into_values().collect())
    }

    /// One app by name.
    pub fn get(&self, name: &str) -> Result<App> {
        self.load()?
            .apps
            .remove(name)
            .ok_or_else(|| Error::AppMissing(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.load()?.apps.contains_key(name))
    }

    /// Ports currently assigned across all registered apps.
    pub fn ports_in_use(&self) -> Result<HashSet<u16>> {
        Ok(self.load()?.apps.values().map(|a| a.port).collect())
    }

    /// Register a new app. Fails if the name is taken.
    pub fn insert(&self, app: App) -> Result<()> {
        let _guard = self.lock.write();
        let mut doc = self.read_doc()?;
        if doc.apps.contains_key(&app.name) {
            return Err(Error::AppAlreadyExists(app.name));
        }
        debug!(name = %app.name, port = app.port, "registering app");
        doc.apps.insert(app.name.clone(), app);
        self.write_doc(&doc)
    }

    /// Mutate one app record in place and persist; returns the new record.
    pub fn update<F>(&self, name: &str, f: F) -> Result<App>
    where
        F: FnOnce(&mut App),
    {
        let _guard = self.lock.write();
        let mut doc = self.read_doc()?;
        let app = doc
            .apps
            .get_mut(name)
            .ok_or_else(|| Error::AppMissing(name.to_string()))?;
        f(app);
        let updated = app.clone();
        self.write_doc(&doc)?;
        Ok(updated)
    }

    /// Mutate the whole document in one persisted write. Used by sweeps
    /// that touch many records but must save only once.
    pub fn update_doc<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut RegistryDoc),
    {
        let _guard = self.lock.write();
        let mut doc = self.read_doc()?;
        f(&mut doc);
        self.write_doc(&doc)
    }

    /// Remove an app record; returns the removed record.
    pub fn remove(&self, name: &str) -> Result<App> {
        let _guard = self.lock.write();
        let mut doc = self.read_doc()?;
        let app = doc
            .apps
            .remove(name)
            .ok_or_else(|| Error::AppMissing(name.to_string()))?;
        self.write_doc(&doc)?;
        Ok(app)
    }

    /// Persist the current document unchanged. Used by the daemon's final
    /// shutdown write.
    pub fn persist(&self) -> Result<()> {
        let _guard = self.lock.write();
        let doc = self.read_doc()?;
        self.write_doc(&doc)
    }

    fn read_doc(&self) -> Result<RegistryDoc> {
        if !self.path.exists() {
            return Ok(RegistryDoc::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(RegistryDoc::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_doc(&self, doc: &RegistryDoc) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(doc)?;
        // Temp file in the same directory so the rename stays on one filesystem
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
