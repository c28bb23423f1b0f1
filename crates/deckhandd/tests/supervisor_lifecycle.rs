//! End-to-end supervisor lifecycle tests using shell children

use chrono::Utc;
use deckhand_core::{
    App, AppEvent, AppKind, AppStatus, Config, DeployMethod, Error, StartSpec, Version,
};
use deckhand_logs::LogHub;
use deckhand_registry::Registry;
use deckhandd::Supervisor;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn test_config(home: &Path) -> Config {
    Config {
        home: home.to_path_buf(),
        port_floor: 25200,
        auto_restart_max: 2,
        auto_restart_window: Duration::from_secs(300),
        restart_backoff: Duration::from_millis(100),
        stop_grace: Duration::from_secs(5),
        log_max_size: 1024 * 1024,
        log_max_files: 3,
    }
}

fn make_app(config: &Config, name: &str, port: u16, shell_cmd: &str, autorestart: bool) -> App {
    let workdir = config.app_dir(name);
    std::fs::create_dir_all(&workdir).unwrap();
    let snapshot_dir = config.versions_dir(name).join("v1700000000000");
    std::fs::create_dir_all(&snapshot_dir).unwrap();

    App {
        name: name.to_string(),
        kind: AppKind::Static,
        workdir,
        port,
        current_version: "v1700000000000".to_string(),
        env: HashMap::new(),
        autorestart,
        webhook_secret: None,
        status: AppStatus::Stopped,
        health: None,
        start_spec: StartSpec::new("sh", vec!["-c".to_string(), shell_cmd.to_string()]),
        source: None,
        versions: vec![Version {
            id: "v1700000000000".to_string(),
            created_at: Utc::now(),
            method: DeployMethod::Archive,
            source: None,
            snapshot_dir,
        }],
        created_at: Utc::now(),
    }
}

struct Harness {
    _home: TempDir,
    config: Config,
    registry: Arc<Registry>,
    supervisor: Supervisor,
}

fn harness() -> Harness {
    let home = TempDir::new().unwrap();
    let config = test_config(home.path());
    config.ensure_dirs().unwrap();
    let registry = Arc::new(Registry::new(config.registry_path()));
    let hub = Arc::new(LogHub::new());
    let supervisor = Supervisor::new(config.clone(), Arc::clone(&registry), hub);
    Harness {
        _home: home,
        config,
        registry,
        supervisor,
    }
}

fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

async fn wait_for_status(registry: &Registry, name: &str, status: AppStatus, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(app) = registry.get(name) {
            if app.status == status {
                return;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {} to become {}",
            name,
            status
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test]
async fn test_start_stop_lifecycle() {
    let h = harness();
    h.registry
        .insert(make_app(&h.config, "sleeper", 25201, "sleep 60", false))
        .unwrap();

    h.supervisor.start("sleeper").await.unwrap();
    assert!(h.supervisor.is_running("sleeper"));
    assert_eq!(
        h.registry.get("sleeper").unwrap().status,
        AppStatus::Running
    );
    let pid = h.supervisor.recorded_pid("sleeper").unwrap();
    assert!(pid_alive(pid));

    // second start is refused
    let err = h.supervisor.start("sleeper").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyRunning(_)));

    h.supervisor.stop("sleeper").await.unwrap();
    assert!(!h.supervisor.is_running("sleeper"));
    assert_eq!(
        h.registry.get("sleeper").unwrap().status,
        AppStatus::Stopped
    );
    // the child is reaped: the recorded pid no longer exists
    assert!(!pid_alive(pid));

    let err = h.supervisor.stop("sleeper").await.unwrap_err();
    assert!(matches!(err, Error::NotRunning(_)));
}

#[tokio::test]
async fn test_start_missing_app() {
    let h = harness();
    let err = h.supervisor.start("ghost").await.unwrap_err();
    assert!(matches!(err, Error::AppMissing(_)));
}

#[tokio::test]
async fn test_start_workdir_gone() {
    let h = harness();
    let app = make_app(&h.config, "gone", 25202, "sleep 60", false);
    h.registry.insert(app).unwrap();
    std::fs::remove_dir_all(h.config.app_dir("gone")).unwrap();

    let err = h.supervisor.start("gone").await.unwrap_err();
    assert!(matches!(err, Error::WorkingDirGone(_)));
}

#[tokio::test]
async fn test_restart_status_sequence() {
    let h = harness();
    h.registry
        .insert(make_app(&h.config, "web", 25203, "sleep 60", false))
        .unwrap();

    h.supervisor.start("web").await.unwrap();
    let mut events = h.supervisor.subscribe_events();

    h.supervisor.restart("web").await.unwrap();

    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let AppEvent::Status { name, status } = event {
            assert_eq!(name, "web");
            statuses.push(status);
        }
    }
    assert_eq!(
        statuses,
        vec![AppStatus::Stopping, AppStatus::Stopped, AppStatus::Running]
    );
    assert!(!statuses.contains(&AppStatus::Crashed));

    h.supervisor.stop("web").await.unwrap();
}

#[tokio::test]
async fn test_clean_exit_is_not_a_crash() {
    let h = harness();
    h.registry
        .insert(make_app(&h.config, "oneshot", 25204, "exit 0", true))
        .unwrap();

    h.supervisor.start("oneshot").await.unwrap();
    wait_for_status(&h.registry, "oneshot", AppStatus::Stopped, Duration::from_secs(10)).await;
    assert!(!h.supervisor.is_running("oneshot"));

    // no restart loop follows a clean exit
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(
        h.registry.get("oneshot").unwrap().status,
        AppStatus::Stopped
    );
}

#[tokio::test]
async fn test_crash_restart_honors_ceiling() {
    let h = harness();
    h.registry
        .insert(make_app(&h.config, "crasher", 25205, "exit 1", true))
        .unwrap();

    let mut events = h.supervisor.subscribe_events();
    h.supervisor.start("crasher").await.unwrap();

    wait_for_status(
        &h.registry,
        "crasher",
        AppStatus::Crashed,
        Duration::from_secs(20),
    )
    .await;

    // initial start plus exactly auto_restart_max restart attempts
    let mut running_events = 0;
    let mut crashed_events = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            AppEvent::Status {
                status: AppStatus::Running,
                ..
            } => running_events += 1,
            AppEvent::Status {
                status: AppStatus::Crashed,
                ..
            } => crashed_events += 1,
            _ => {}
        }
    }
    assert_eq!(running_events, 1 + h.config.auto_restart_max as usize);
    assert_eq!(crashed_events, 1);

    // no further attempts until a manual start
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
    assert!(!h.supervisor.is_running("crasher"));
}

#[tokio::test]
async fn test_no_autorestart_goes_straight_to_crashed() {
    let h = harness();
    h.registry
        .insert(make_app(&h.config, "fragile", 25206, "exit 7", false))
        .unwrap();

    h.supervisor.start("fragile").await.unwrap();
    wait_for_status(
        &h.registry,
        "fragile",
        AppStatus::Crashed,
        Duration::from_secs(10),
    )
    .await;
}

#[tokio::test]
async fn test_child_sees_assigned_port() {
    let h = harness();
    h.registry
        .insert(make_app(
            &h.config,
            "env-echo",
            25207,
            "echo got-port-$PORT; sleep 60",
            false,
        ))
        .unwrap();

    h.supervisor.start("env-echo").await.unwrap();
    // give the capture task a moment to drain the line
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.supervisor.stop("env-echo").await.unwrap();

    let log = std::fs::read_to_string(h.config.log_path("env-echo")).unwrap();
    assert!(log.contains("got-port-25207"));
}
