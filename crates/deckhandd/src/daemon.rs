//! Daemon orchestration: background observers, the IPC accept loop, and
//! graceful shutdown

use deckhand_core::{
    constants, AppEvent, AppStatus, Config, HealthRecord, HealthStatus, ResourceSample, Result,
};
use deckhand_health::{HealthProber, ResourceSampler};
use deckhand_ipc::{IpcServer, Request, Response};
use deckhand_logs::LogHub;
use deckhand_registry::Registry;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::handlers::RequestHandler;
use crate::pipeline::DeployPipeline;
use crate::ports::PortAllocator;
use crate::supervisor::Supervisor;
use crate::webhook::WebhookRedeployer;

/// Main daemon struct
pub struct Daemon {
    server: IpcServer,
    handler: Arc<RequestHandler>,
    supervisor: Supervisor,
    registry: Arc<Registry>,
    shutdown: Arc<Notify>,
}

impl Daemon {
    pub async fn new(config: Config) -> Result<Self> {
        config.ensure_dirs()?;

        let registry = Arc::new(Registry::new(config.registry_path()));

        // nothing survived the previous daemon; reconcile stale statuses
        registry.update_doc(|doc| {
            for app in doc.apps.values_mut() {
                if app.status.is_running() {
                    app.status = AppStatus::Stopped;
                }
            }
        })?;

        let hub = Arc::new(LogHub::new());
        let supervisor = Supervisor::new(config.clone(), Arc::clone(&registry), Arc::clone(&hub));
        let allocator = Arc::new(Mutex::new(PortAllocator::new(config.port_floor)));
        let pipeline = DeployPipeline::new(
            config.clone(),
            Arc::clone(&registry),
            supervisor.clone(),
            allocator,
            Arc::clone(&hub),
        );
        let webhook = WebhookRedeployer::new(
            config.clone(),
            Arc::clone(&registry),
            supervisor.clone(),
            Arc::clone(&hub),
        );

        let samples = Arc::new(RwLock::new(HashMap::new()));
        spawn_resource_sampler(supervisor.clone(), Arc::clone(&samples));
        spawn_health_sweep(config.clone(), Arc::clone(&registry), supervisor.clone());

        let handler = Arc::new(RequestHandler::new(
            config.clone(),
            Arc::clone(&registry),
            supervisor.clone(),
            pipeline,
            webhook,
            samples,
        ));

        let server = IpcServer::bind(&config.socket_path()).await?;

        Ok(Self {
            server,
            handler,
            supervisor,
            registry,
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Accept connections until a Kill request or an external shutdown.
    pub async fn run(&self) -> Result<()> {
        info!("daemon running, waiting for connections");
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return Ok(()),
                accepted = self.server.accept() => {
                    let mut conn = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    let handler = Arc::clone(&self.handler);
                    let shutdown = Arc::clone(&self.shutdown);

                    tokio::spawn(async move {
                        loop {
                            match conn.read_request().await {
                                Ok(Some(Request::Kill)) => {
                                    let _ = conn.send_response(&Response::ok("shutting down")).await;
                                    shutdown.notify_waiters();
                                    break;
                                }
                                Ok(Some(request)) => {
                                    let response = handler.handle(request).await;
                                    if let Err(e) = conn.send_response(&response).await {
                                        error!("failed to send response: {}", e);
                                        break;
                                    }
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    error!("error reading request: {}", e);
                                    break;
                                }
                            }
                        }
                    });
                }
            }
        }
    }

    /// Stop every child with grace, then persist the registry one final
    /// time.
    pub async fn shutdown(&self) {
        info!("shutting down: stopping all apps");
        self.supervisor.shutdown().await;
        if let Err(e) = self.registry.persist() {
            error!("final registry write failed: {}", e);
        }
    }
}

/// Every 2s, sample cpu/rss of live children and publish the snapshot.
fn spawn_resource_sampler(
    supervisor: Supervisor,
    samples: Arc<RwLock<HashMap<String, ResourceSample>>>,
) {
    tokio::spawn(async move {
        let sampler = ResourceSampler::new();
        let mut interval =
            tokio::time::interval(Duration::from_secs(constants::METRICS_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let pids = supervisor.live_pids();
            if pids.is_empty() {
                samples.write().clear();
                continue;
            }
            let snapshot = sampler.sample(&pids);
            *samples.write() = snapshot.clone();
            supervisor.publish(AppEvent::Resources { samples: snapshot });
        }
    });
}

/// Every 60s, probe each app's port, persist all health records in one
/// registry write, and purge logs whose app no longer exists.
fn spawn_health_sweep(config: Config, registry: Arc<Registry>, supervisor: Supervisor) {
    tokio::spawn(async move {
        let prober = HealthProber::new();
        let mut interval =
            tokio::time::interval(Duration::from_secs(constants::HEALTH_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let apps = match registry.list() {
                Ok(apps) => apps,
                Err(e) => {
                    warn!("health sweep could not read registry: {}", e);
                    continue;
                }
            };

            let mut records: HashMap<String, HealthRecord> = HashMap::new();
            for app in &apps {
                let record = if supervisor.is_running(&app.name) {
                    prober.probe(app.port).await
                } else {
                    HealthRecord::now(HealthStatus::Stopped)
                };
                supervisor.publish(AppEvent::Health {
                    name: app.name.clone(),
                    record: record.clone(),
                });
                records.insert(app.name.clone(), record);
            }

            // one persisted save per full sweep
            if let Err(e) = registry.update_doc(|doc| {
                for (name, record) in records {
                    if let Some(app) = doc.apps.get_mut(&name) {
                        app.health = Some(record);
                    }
                }
            }) {
                warn!("health sweep could not persist records: {}", e);
            }

            let names: Vec<String> = apps.iter().map(|a| a.name.clone()).collect();
            purge_orphan_logs(&config.logs_dir(), &names);
        }
    });
}

/// Remove log files left behind by deleted apps.
fn purge_orphan_logs(logs_dir: &Path, live_names: &[String]) {
    let entries = match std::fs::read_dir(logs_dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        // "<name>.log" or "<name>.log.N"
        if !file_name.contains(".log") {
            continue;
        }
        let Some(owner) = file_name.split(".log").next() else {
            continue;
        };
        if owner.is_empty() || live_names.iter().any(|n| n == owner) {
            continue;
        }
        debug!(file = %file_name, "purging orphan log");
        let _ = std::fs::remove_file(entry.path());
    }
}
