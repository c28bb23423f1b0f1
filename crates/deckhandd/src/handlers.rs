//! IPC request handlers

use deckhand_core::{AppEvent, Config, HealthRecord, HealthStatus, PlatformReport, ResourceSample};
use deckhand_health::HealthProber;
use deckhand_ipc::{DeploySource as IpcSource, Request, Response};
use deckhand_logs::LogReader;
use deckhand_registry::Registry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::pipeline::{DeployPipeline, DeploySource};
use crate::supervisor::Supervisor;
use crate::webhook::WebhookRedeployer;

/// Translates IPC requests into supervisor and pipeline operations
pub struct RequestHandler {
    config: Config,
    registry: Arc<Registry>,
    supervisor: Supervisor,
    pipeline: DeployPipeline,
    webhook: WebhookRedeployer,
    prober: HealthProber,
    /// Latest resource snapshot, refreshed by the sampler task
    samples: Arc<RwLock<HashMap<String, ResourceSample>>>,
    started_at: Instant,
}

impl RequestHandler {
    pub fn new(
        config: Config,
        registry: Arc<Registry>,
        supervisor: Supervisor,
        pipeline: DeployPipeline,
        webhook: WebhookRedeployer,
        samples: Arc<RwLock<HashMap<String, ResourceSample>>>,
    ) -> Self {
        Self {
            config,
            registry,
            supervisor,
            pipeline,
            webhook,
            prober: HealthProber::new(),
            samples,
            started_at: Instant::now(),
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,
            Request::Deploy { name, source } => self.deploy(name, source).await,
            Request::List => self.list(),
            Request::Show { name } => self.show(&name),
            Request::Delete { name } => self.delete(&name).await,
            Request::Start { name } => self.start(&name).await,
            Request::Stop { name } => self.stop(&name).await,
            Request::Restart { name } => self.restart(&name).await,
            Request::Logs { name, lines } => self.logs(&name, lines),
            Request::Versions { name } => self.versions(&name),
            Request::Rollback { name, version } => self.rollback(&name, &version).await,
            Request::GetEnv { name } => self.get_env(&name),
            Request::SetEnv { name, env } => self.set_env(&name, env),
            Request::SetWebhookSecret { name, secret } => self.set_webhook_secret(&name, secret),
            Request::Webhook {
                name,
                body,
                signature,
            } => self.receive_webhook(&name, &body, signature.as_deref()).await,
            Request::Health { name } => self.health(&name).await,
            Request::PlatformHealth => self.platform_health(),
            // Kill is resolved by the daemon loop before reaching here
            Request::Kill => Response::ok("shutting down"),
        }
    }

    async fn deploy(&self, name: String, source: IpcSource) -> Response {
        info!(name, "handling deploy request");
        let source = match source {
            IpcSource::Archive { data } => DeploySource::Archive(data),
            IpcSource::Git { url, branch } => DeploySource::Git { url, branch },
        };
        match self.pipeline.deploy(&name, source).await {
            Ok(app) => Response::Deployed {
                app: self.with_resources(app.summary()),
            },
            Err(e) => {
                error!(name, "deploy failed: {}", e);
                Response::error(&e)
            }
        }
    }

    fn list(&self) -> Response {
        match self.registry.list() {
            Ok(apps) => Response::Apps {
                apps: apps
                    .iter()
                    .map(|a| self.with_resources(a.summary()))
                    .collect(),
            },
            Err(e) => Response::error(&e),
        }
    }

    fn show(&self, name: &str) -> Response {
        match self.registry.get(name) {
            Ok(app) => Response::App {
                app: self.with_resources(app.summary()),
            },
            Err(e) => Response::error(&e),
        }
    }

    async fn delete(&self, name: &str) -> Response {
        match self.pipeline.delete(name).await {
            Ok(()) => Response::ok(format!("deleted {}", name)),
            Err(e) => Response::error(&e),
        }
    }

    async fn start(&self, name: &str) -> Response {
        match self.supervisor.start(name).await {
            Ok(()) => Response::ok(format!("started {}", name)),
            Err(e) => Response::error(&e),
        }
    }

    async fn stop(&self, name: &str) -> Response {
        match self.supervisor.stop(name).await {
            Ok(()) => Response::ok(format!("stopped {}", name)),
            Err(e) => Response::error(&e),
        }
    }

    async fn restart(&self, name: &str) -> Response {
        match self.supervisor.restart(name).await {
            Ok(()) => Response::ok(format!("restarted {}", name)),
            Err(e) => Response::error(&e),
        }
    }

    fn logs(&self, name: &str, lines: usize) -> Response {
        if let Err(e) = self.registry.get(name) {
            return Response::error(&e);
        }
        let reader = LogReader::new(self.config.log_path(name));
        match reader.tail(lines) {
            Ok(lines) => Response::LogLines { lines },
            Err(e) => Response::error(&e),
        }
    }

    fn versions(&self, name: &str) -> Response {
        match self.registry.get(name) {
            Ok(app) => Response::Versions {
                current: app.current_version,
                versions: app.versions,
            },
            Err(e) => Response::error(&e),
        }
    }

    async fn rollback(&self, name: &str, version: &str) -> Response {
        match self.pipeline.rollback(name, version).await {
            Ok(app) => Response::App {
                app: self.with_resources(app.summary()),
            },
            Err(e) => Response::error(&e),
        }
    }

    fn get_env(&self, name: &str) -> Response {
        match self.registry.get(name) {
            Ok(app) => Response::Env { env: app.env },
            Err(e) => Response::error(&e),
        }
    }

    fn set_env(&self, name: &str, env: HashMap<String, String>) -> Response {
        match self.registry.update(name, |app| app.env = env) {
            Ok(_) => Response::ok(format!(
                "environment updated for {}; restart to apply",
                name
            )),
            Err(e) => Response::error(&e),
        }
    }

    fn set_webhook_secret(&self, name: &str, secret: Option<String>) -> Response {
        let configured = secret.is_some();
        match self
            .registry
            .update(name, |app| app.webhook_secret = secret.map(String::into_bytes))
        {
            Ok(_) => Response::ok(if configured {
                format!("webhook secret set for {}", name)
            } else {
                format!("webhook secret cleared for {}", name)
            }),
            Err(e) => Response::error(&e),
        }
    }

    async fn receive_webhook(
        &self,
        name: &str,
        body: &[u8],
        signature: Option<&str>,
    ) -> Response {
        match self.webhook.redeploy(name, body, signature).await {
            Ok(()) => Response::ok(format!("redeployed {}", name)),
            Err(e) => Response::error(&e),
        }
    }

    /// On-demand probe of one app, persisting the fresh record.
    async fn health(&self, name: &str) -> Response {
        let app = match self.registry.get(name) {
            Ok(app) => app,
            Err(e) => return Response::error(&e),
        };

        let record = if self.supervisor.is_running(name) {
            self.prober.probe(app.port).await
        } else {
            HealthRecord::now(HealthStatus::Stopped)
        };

        let _ = self
            .registry
            .update(name, |a| a.health = Some(record.clone()));
        self.supervisor.publish(AppEvent::Health {
            name: name.to_string(),
            record: record.clone(),
        });
        Response::Health { record }
    }

    fn platform_health(&self) -> Response {
        let registry_ok = self.registry.load().is_ok();
        let app_count = self.registry.list().map(|a| a.len()).unwrap_or(0);
        Response::Platform {
            report: PlatformReport {
                uptime_secs: self.started_at.elapsed().as_secs(),
                registry_ok,
                apps_root_ok: self.config.apps_dir().is_dir(),
                app_count,
            },
        }
    }

    fn with_resources(
        &self,
        mut summary: deckhand_core::AppSummary,
    ) -> deckhand_core::AppSummary {
        summary.resources = self.samples.read().get(&summary.name).copied();
        summary
    }
}
