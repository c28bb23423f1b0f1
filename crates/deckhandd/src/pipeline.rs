//! Deployment pipeline: materialize, classify, install, snapshot,
//! allocate, register, start
//!
//! Each deploy is a linear procedure that pushes a cleanup action after
//! every step with side effects; on failure the stack runs in reverse and
//! the app never existed. On success the stack is discarded.

use chrono::Utc;
use deckhand_core::{
    normalize_app_name, App, AppKind, AppStatus, Config, DeployMethod, Error, GitSource, Result,
    StartSpec,
};
use deckhand_deploy::{classify, extract_archive, git, install_dependencies, VersionStore};
use deckhand_logs::{AppLog, LogHub, LogSource, RotationConfig};
use deckhand_registry::Registry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::ports::PortAllocator;
use crate::supervisor::Supervisor;

/// Where a deploy gets its tree from
#[derive(Debug, Clone)]
pub enum DeploySource {
    Archive(Vec<u8>),
    Git { url: String, branch: Option<String> },
}

/// Deferred cleanup actions, run in reverse only when a deploy fails
struct CleanupStack {
    actions: Vec<Box<dyn FnOnce() + Send>>,
}

impl CleanupStack {
    fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    fn push<F: FnOnce() + Send + 'static>(&mut self, action: F) {
        self.actions.push(Box::new(action));
    }

    fn disarm(&mut self) {
        self.actions.clear();
    }

    fn run(&mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
    }
}

pub struct DeployPipeline {
    config: Config,
    registry: Arc<Registry>,
    supervisor: Supervisor,
    allocator: Arc<Mutex<PortAllocator>>,
    hub: Arc<LogHub>,
}

impl DeployPipeline {
    pub fn new(
        config: Config,
        registry: Arc<Registry>,
        supervisor: Supervisor,
        allocator: Arc<Mutex<PortAllocator>>,
        hub: Arc<LogHub>,
    ) -> Self {
        Self {
            config,
            registry,
            supervisor,
            allocator,
            hub,
        }
    }

    /// Deploy a new app. On any failure the app directory is removed and
    /// nothing is registered.
    pub async fn deploy(&self, requested_name: &str, source: DeploySource) -> Result<App> {
        let name = normalize_app_name(requested_name)?;
        if self.registry.contains(&name)? {
            return Err(Error::AppAlreadyExists(name));
        }
        let app_dir = self.config.app_dir(&name);
        if app_dir.exists() {
            return Err(Error::AppAlreadyExists(name));
        }

        let _guard = self.supervisor.op_lock(&name).await;

        let mut cleanup = CleanupStack::new();
        match self.deploy_inner(&name, source, &app_dir, &mut cleanup).await {
            Ok(app) => {
                cleanup.disarm();
                info!(name = %app.name, port = app.port, kind = %app.kind, "deployed app");
                Ok(app)
            }
            Err(e) => {
                warn!(name = %name, "deploy failed, rolling back: {}", e);
                cleanup.run();
                Err(e)
            }
        }
    }

    async fn deploy_inner(
        &self,
        name: &str,
        source: DeploySource,
        app_dir: &Path,
        cleanup: &mut CleanupStack,
    ) -> Result<App> {
        fs::create_dir_all(app_dir)?;
        {
            let dir = app_dir.to_path_buf();
            cleanup.push(move || {
                let _ = fs::remove_dir_all(&dir);
            });
        }

        // materialize the tree
        let (method, git_source) = match source {
            DeploySource::Archive(data) => {
                extract_archive(&data, app_dir)?;
                (DeployMethod::Archive, None)
            }
            DeploySource::Git { url, branch } => {
                git::clone_shallow(&url, branch.as_deref(), app_dir).await?;
                let branch = match branch {
                    Some(b) => b,
                    None => git::current_branch(app_dir).await?,
                };
                let commit = git::short_commit(app_dir).await?;
                (
                    DeployMethod::Git,
                    Some(GitSource {
                        url,
                        branch,
                        commit: Some(commit),
                    }),
                )
            }
        };

        let classification = classify(app_dir)?;
        let workdir = classification.root.clone();
        if !self.config.within_apps_root(&workdir) {
            return Err(Error::UnsafeArchivePath(workdir.display().to_string()));
        }

        if classification.kind == AppKind::Node {
            let topic = self.hub.topic(name);
            let rotation =
                RotationConfig::new(self.config.log_max_size, self.config.log_max_files);
            let log = Arc::new(AppLog::open(self.config.log_path(name), rotation, topic)?);
            log.write(LogSource::System, "installing dependencies");
            install_dependencies(&workdir, log).await?;
        }

        let port = self
            .allocator
            .lock()
            .allocate(&self.registry.ports_in_use()?)?;
        {
            let allocator = Arc::clone(&self.allocator);
            cleanup.push(move || allocator.lock().release(port));
        }

        let start_spec = match classification.kind {
            AppKind::Node => classification
                .start_spec
                .clone()
                .ok_or_else(|| Error::UnclassifiableProject(workdir.clone()))?,
            AppKind::Static => StartSpec::static_server(port),
        };

        let store = VersionStore::new(self.config.versions_dir(name));
        let version = store.snapshot(&workdir, method, git_source.clone())?;

        let app = App {
            name: name.to_string(),
            kind: classification.kind,
            workdir,
            port,
            current_version: version.id.clone(),
            env: HashMap::new(),
            autorestart: true,
            webhook_secret: None,
            status: AppStatus::Stopped,
            health: None,
            start_spec,
            source: git_source,
            versions: vec![version],
            created_at: Utc::now(),
        };

        self.registry.insert(app)?;
        {
            let registry = Arc::clone(&self.registry);
            let name = name.to_string();
            cleanup.push(move || {
                let _ = registry.remove(&name);
            });
        }

        self.supervisor.start_inner(name).await?;
        self.allocator.lock().release(port);

        self.registry.get(name)
    }

    /// Roll back to a previous version: stop, restore the snapshot,
    /// advance `current_version`, start.
    pub async fn rollback(&self, name: &str, version_id: &str) -> Result<App> {
        let _guard = self.supervisor.op_lock(name).await;

        let app = self.registry.get(name)?;
        let version = app
            .version(version_id)
            .cloned()
            .ok_or_else(|| Error::VersionMissing(version_id.to_string()))?;
        if app.current_version == version.id {
            return Err(Error::AlreadyAtVersion(version.id));
        }

        if self.supervisor.is_running(name) {
            self.supervisor.stop_inner(name).await?;
        }

        let store = VersionStore::new(self.config.versions_dir(name));
        store.restore(&version, &app.workdir)?;

        self.registry
            .update(name, |a| a.current_version = version.id.clone())?;

        self.supervisor.start_inner(name).await?;
        info!(name, version = %version.id, "rolled back");
        self.registry.get(name)
    }

    /// Delete an app: stop it, remove its directory, unregister it.
    /// Orphaned log files are purged by the next health sweep.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let _guard = self.supervisor.op_lock(name).await;

        if !self.registry.contains(name)? {
            return Err(Error::AppMissing(name.to_string()));
        }
        if self.supervisor.is_running(name) {
            if let Err(e) = self.supervisor.stop_inner(name).await {
                warn!(name, "stop during delete failed: {}", e);
            }
        }

        let app_dir = self.config.app_dir(name);
        if app_dir.exists() {
            fs::remove_dir_all(&app_dir)?;
        }
        self.registry.remove(name)?;
        self.hub.remove(name);
        info!(name, "deleted app");
        Ok(())
    }
}
