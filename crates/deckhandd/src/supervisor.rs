//! Process supervisor - owns the child process of every running app
//!
//! The process map mutex is held only for insert/remove/lookup; spawning,
//! signalling, and waiting all happen outside it. Operations on one app
//! are serialized through a per-app lock; apps are independent of each
//! other.

use deckhand_core::{constants, AppEvent, AppStatus, Config, Error, Result};
use deckhand_logs::{AppLog, LogCapture, LogHub, LogSource, RotationConfig};
use deckhand_registry::Registry;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Crash bookkeeping, kept per app name so it survives child death
#[derive(Debug, Clone, Copy)]
pub(crate) struct RestartCounter {
    count: u32,
    window_start: Instant,
}

impl RestartCounter {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    /// Record one crash. Returns the attempt number when a restart is
    /// allowed, `None` once the ceiling for this window is reached.
    fn register_crash(&mut self, max: u32, window: Duration) -> Option<u32> {
        if self.window_start.elapsed() > window {
            self.count = 0;
            self.window_start = Instant::now();
        }
        if self.count < max {
            self.count += 1;
            Some(self.count)
        } else {
            None
        }
    }
}

/// One supervised child
struct SupervisedApp {
    pid: u32,
    child: Option<Child>,
    status: AppStatus,
    started_at: Instant,
    autorestart: bool,
    log: Arc<AppLog>,
}

struct SupervisorInner {
    config: Config,
    registry: Arc<Registry>,
    hub: Arc<LogHub>,
    procs: RwLock<HashMap<String, SupervisedApp>>,
    counters: Mutex<HashMap<String, RestartCounter>>,
    op_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    events: broadcast::Sender<AppEvent>,
}

/// Cheap-to-clone handle to the supervisor state
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

impl Supervisor {
    pub fn new(config: Config, registry: Arc<Registry>, hub: Arc<LogHub>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(SupervisorInner {
                config,
                registry,
                hub,
                procs: RwLock::new(HashMap::new()),
                counters: Mutex::new(HashMap::new()),
                op_locks: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AppEvent> {
        self.inner.events.subscribe()
    }

    pub fn publish(&self, event: AppEvent) {
        let _ = self.inner.events.send(event);
    }

    /// Per-app operation lock: start/stop/restart/deploy/rollback on one
    /// app are totally ordered, operations on distinct apps interleave.
    pub async fn op_lock(&self, name: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .inner
            .op_locks
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.inner.procs.read().contains_key(name)
    }

    /// `name -> pid` of every live child, for the resource sampler
    pub fn live_pids(&self) -> HashMap<String, u32> {
        self.inner
            .procs
            .read()
            .iter()
            .filter(|(_, p)| p.child.is_some())
            .map(|(name, p)| (name.clone(), p.pid))
            .collect()
    }

    pub fn recorded_pid(&self, name: &str) -> Option<u32> {
        self.inner.procs.read().get(name).map(|p| p.pid)
    }

    pub async fn start(&self, name: &str) -> Result<()> {
        let _guard = self.op_lock(name).await;
        self.start_inner(name).await
    }

    pub async fn stop(&self, name: &str) -> Result<()> {
        let _guard = self.op_lock(name).await;
        self.stop_inner(name).await
    }

    pub async fn restart(&self, name: &str) -> Result<()> {
        let _guard = self.op_lock(name).await;
        if self.is_running(name) {
            self.stop_inner(name).await?;
        }
        self.start_inner(name).await
    }

    /// Stop every running app with grace. Called on daemon shutdown.
    pub async fn shutdown(&self) {
        let names: Vec<String> = self.inner.procs.read().keys().cloned().collect();
        for name in names {
            if let Err(e) = self.stop(&name).await {
                warn!(name = %name, "failed to stop app during shutdown: {}", e);
            }
        }
    }

    /// Start without taking the op lock; callers already hold it.
    pub(crate) async fn start_inner(&self, name: &str) -> Result<()> {
        let app = self.inner.registry.get(name)?;
        if self.inner.procs.read().contains_key(name) {
            return Err(Error::AlreadyRunning(name.to_string()));
        }
        if !app.workdir.exists() {
            return Err(Error::WorkingDirGone(app.workdir.clone()));
        }

        let topic = self.inner.hub.topic(name);
        let rotation = RotationConfig::new(
            self.inner.config.log_max_size,
            self.inner.config.log_max_files,
        );
        let log = Arc::new(AppLog::open(
            self.inner.config.log_path(name),
            rotation,
            topic,
        )?);

        // environment: platform env, then app env, then the assigned port
        let mut cmd = Command::new(&app.start_spec.command);
        cmd.args(&app.start_spec.args)
            .current_dir(&app.workdir)
            .envs(std::env::vars())
            .envs(&app.env)
            .env("PORT", app.port.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::spawn(format!("{}: {}", app.start_spec.display(), e)))?;
        let pid = child
            .id()
            .ok_or_else(|| Error::spawn("process started but no PID available"))?;

        LogCapture::spawn(Arc::clone(&log), child.stdout.take(), child.stderr.take());
        log.write(LogSource::System, &format!("started (pid {})", pid));

        self.inner.procs.write().insert(
            name.to_string(),
            SupervisedApp {
                pid,
                child: Some(child),
                status: AppStatus::Running,
                started_at: Instant::now(),
                autorestart: app.autorestart,
                log,
            },
        );

        self.inner
            .registry
            .update(name, |a| a.status = AppStatus::Running)?;
        self.publish(AppEvent::Status {
            name: name.to_string(),
            status: AppStatus::Running,
        });
        info!(name, pid, "started app");

        self.spawn_monitor(name.to_string());
        Ok(())
    }

    /// Stop without taking the op lock; callers already hold it.
    pub(crate) async fn stop_inner(&self, name: &str) -> Result<()> {
        // an explicit stop is never interpreted as a crash
        self.inner.counters.lock().remove(name);

        let (mut child, pid, log) = {
            let mut procs = self.inner.procs.write();
            let proc = procs
                .get_mut(name)
                .ok_or_else(|| Error::NotRunning(name.to_string()))?;
            let child = proc
                .child
                .take()
                .ok_or_else(|| Error::NotRunning(name.to_string()))?;
            proc.status = AppStatus::Stopping;
            (child, proc.pid, Arc::clone(&proc.log))
        };

        let _ = self
            .inner
            .registry
            .update(name, |a| a.status = AppStatus::Stopping);
        self.publish(AppEvent::Status {
            name: name.to_string(),
            status: AppStatus::Stopping,
        });

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }

        match tokio::time::timeout(self.inner.config.stop_grace, child.wait()).await {
            Ok(Ok(status)) => debug!(name, ?status, "child exited within grace"),
            Ok(Err(e)) => warn!(name, "error waiting for child: {}", e),
            Err(_) => {
                warn!(name, "grace window elapsed, killing");
                let _ = child.kill().await;
            }
        }

        log.write(LogSource::System, "stopped");
        self.inner.procs.write().remove(name);
        self.inner
            .registry
            .update(name, |a| a.status = AppStatus::Stopped)?;
        self.publish(AppEvent::Status {
            name: name.to_string(),
            status: AppStatus::Stopped,
        });
        info!(name, "stopped app");
        Ok(())
    }

    /// Watch one child for exit, clearing the restart counter after a
    /// stable run.
    fn spawn_monitor(&self, name: String) {
        let sup = self.clone();
        tokio::spawn(async move {
            let mut counter_cleared = false;
            loop {
                tokio::time::sleep(Duration::from_millis(500)).await;

                let exit = {
                    let mut procs = sup.inner.procs.write();
                    let proc = match procs.get_mut(&name) {
                        Some(p) => p,
                        None => return,
                    };
                    let child = match proc.child.as_mut() {
                        Some(c) => c,
                        // a Stop took ownership of the child
                        None => return,
                    };
                    match child.try_wait() {
                        Ok(Some(status)) => {
                            proc.child = None;
                            Some(status)
                        }
                        Ok(None) => None,
                        Err(e) => {
                            warn!(name = %name, "error polling child: {}", e);
                            None
                        }
                    }
                };

                match exit {
                    Some(status) => {
                        sup.handle_exit(&name, status).await;
                        return;
                    }
                    None if !counter_cleared => {
                        let stable = sup
                            .inner
                            .procs
                            .read()
                            .get(&name)
                            .map(|p| p.started_at.elapsed())
                            .unwrap_or_default()
                            >= Duration::from_secs(constants::STABLE_RUN_SECS);
                        if stable {
                            sup.inner.counters.lock().remove(&name);
                            counter_cleared = true;
                        }
                    }
                    None => {}
                }
            }
        });
    }

    /// A child exited on its own. Decide between stopped, crash-restart,
    /// and crashed.
    async fn handle_exit(&self, name: &str, status: ExitStatus) {
        let entry = match self.inner.procs.write().remove(name) {
            Some(e) => e,
            None => return,
        };
        let code = status.code();
        entry.log.write(
            LogSource::System,
            &format!("process exited with code {:?}", code),
        );

        let unexpected = !status.success() && entry.status != AppStatus::Stopping;
        if !unexpected {
            let _ = self
                .inner
                .registry
                .update(name, |a| a.status = AppStatus::Stopped);
            self.publish(AppEvent::Status {
                name: name.to_string(),
                status: AppStatus::Stopped,
            });
            return;
        }

        if entry.autorestart {
            let attempt = self
                .inner
                .counters
                .lock()
                .entry(name.to_string())
                .or_insert_with(RestartCounter::new)
                .register_crash(
                    self.inner.config.auto_restart_max,
                    self.inner.config.auto_restart_window,
                );

            if let Some(attempt) = attempt {
                entry.log.write(
                    LogSource::System,
                    &format!(
                        "crash detected, restarting (attempt {}/{})",
                        attempt, self.inner.config.auto_restart_max
                    ),
                );
                let _ = self
                    .inner
                    .registry
                    .update(name, |a| a.status = AppStatus::Stopped);
                self.publish(AppEvent::Status {
                    name: name.to_string(),
                    status: AppStatus::Stopped,
                });

                let sup = self.clone();
                let name = name.to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(sup.inner.config.restart_backoff).await;
                    let _guard = sup.op_lock(&name).await;
                    if sup.inner.procs.read().contains_key(&name) {
                        // a manual start got there first
                        return;
                    }
                    if let Err(e) = sup.start_inner(&name).await {
                        warn!(name = %name, "crash-restart failed: {}", e);
                    }
                });
                return;
            }
        }

        warn!(name, exit_code = ?code, "app crashed");
        let _ = self
            .inner
            .registry
            .update(name, |a| a.status = AppStatus::Crashed);
        self.publish(AppEvent::Status {
            name: name.to_string(),
            status: AppStatus::Crashed,
        });
    }
}
