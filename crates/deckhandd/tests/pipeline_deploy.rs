//! Deployment pipeline, rollback, and webhook tests

use chrono::Utc;
use deckhand_core::{
    App, AppKind, AppStatus, Config, DeployMethod, Error, StartSpec,
};
use deckhand_deploy::VersionStore;
use deckhand_logs::LogHub;
use deckhand_registry::Registry;
use deckhandd::{DeployPipeline, DeploySource, PortAllocator, Supervisor, WebhookRedeployer};
use flate2::write::GzEncoder;
use flate2::Compression;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use sha2::Sha256;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn test_config(home: &Path) -> Config {
    Config {
        home: home.to_path_buf(),
        port_floor: 26200,
        auto_restart_max: 3,
        auto_restart_window: Duration::from_secs(300),
        restart_backoff: Duration::from_millis(100),
        stop_grace: Duration::from_secs(5),
        log_max_size: 1024 * 1024,
        log_max_files: 3,
    }
}

struct Harness {
    _home: TempDir,
    config: Config,
    registry: Arc<Registry>,
    supervisor: Supervisor,
    pipeline: DeployPipeline,
    webhook: WebhookRedeployer,
}

fn harness() -> Harness {
    let home = TempDir::new().unwrap();
    let config = test_config(home.path());
    config.ensure_dirs().unwrap();
    let registry = Arc::new(Registry::new(config.registry_path()));
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
        hub,
    );
    Harness {
        _home: home,
        config,
        registry,
        supervisor,
        pipeline,
        webhook,
    }
}

fn make_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in files {
        // write the name bytes directly so adversarial `..` paths
        // survive into the archive
        let mut header = tar::Header::new_gnu();
        header.as_old_mut().name[..path.len()].copy_from_slice(path.as_bytes());
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, *contents).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// An app record with a harmless shell child, for tests that exercise
/// rollback and webhooks without external toolchains.
fn shell_app(config: &Config, name: &str, port: u16) -> App {
    let workdir = config.app_dir(name);
    std::fs::create_dir_all(&workdir).unwrap();
    App {
        name: name.to_string(),
        kind: AppKind::Static,
        workdir,
        port,
        current_version: String::new(),
        env: HashMap::new(),
        autorestart: false,
        webhook_secret: None,
        status: AppStatus::Stopped,
        health: None,
        start_spec: StartSpec::new("sh", vec!["-c".to_string(), "sleep 60".to_string()]),
        source: None,
        versions: vec![],
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_deploy_rejects_zip_slip() {
    let h = harness();
    let archive = make_archive(&[("../../../../etc/evil", b"owned")]);

    let err = h
        .pipeline
        .deploy("intruder", DeploySource::Archive(archive))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsafeArchivePath(_)));

    // no partial state: directory removed, nothing registered
    assert!(!h.config.app_dir("intruder").exists());
    assert!(h.registry.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_deploy_rejects_unclassifiable() {
    let h = harness();
    let archive = make_archive(&[("README.md", b"nothing to run here")]);

    let err = h
        .pipeline
        .deploy("mystery", DeploySource::Archive(archive))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnclassifiableProject(_)));
    assert!(!h.config.app_dir("mystery").exists());
}

#[tokio::test]
async fn test_deploy_rejects_invalid_name() {
    let h = harness();
    let archive = make_archive(&[("index.html", b"<h1>hi</h1>")]);

    let err = h
        .pipeline
        .deploy("!!!", DeploySource::Archive(archive))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidName(_)));
}

#[tokio::test]
async fn test_deploy_rejects_duplicate_name() {
    let h = harness();
    h.registry
        .insert(shell_app(&h.config, "taken", 26201))
        .unwrap();

    let archive = make_archive(&[("index.html", b"<h1>hi</h1>")]);
    let err = h
        .pipeline
        .deploy("Taken", DeploySource::Archive(archive))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AppAlreadyExists(_)));
}

#[tokio::test]
async fn test_rollback_restores_snapshot_and_is_idempotent() {
    let h = harness();
    let mut app = shell_app(&h.config, "site", 26202);
    let workdir = app.workdir.clone();

    // v1, then mutate the tree and take v2
    std::fs::write(workdir.join("index.html"), "<h1>v1</h1>").unwrap();
    let store = VersionStore::new(h.config.versions_dir("site"));
    let v1 = store
        .snapshot(&workdir, DeployMethod::Archive, None)
        .unwrap();
    std::fs::write(workdir.join("index.html"), "<h1>v2</h1>").unwrap();
    let v2 = store
        .snapshot(&workdir, DeployMethod::Webhook, None)
        .unwrap();

    app.current_version = v2.id.clone();
    app.versions = vec![v1.clone(), v2.clone()];
    h.registry.insert(app).unwrap();

    let rolled = h.pipeline.rollback("site", &v1.id).await.unwrap();
    assert_eq!(rolled.current_version, v1.id);
    assert_eq!(
        std::fs::read_to_string(workdir.join("index.html")).unwrap(),
        "<h1>v1</h1>"
    );
    assert_eq!(rolled.status, AppStatus::Running);
    assert!(h.supervisor.is_running("site"));

    // rolling back to the active version is a no-op error
    let err = h.pipeline.rollback("site", &v1.id).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyAtVersion(_)));

    // unknown version
    let err = h.pipeline.rollback("site", "v0").await.unwrap_err();
    assert!(matches!(err, Error::VersionMissing(_)));

    h.supervisor.stop("site").await.unwrap();
}

#[tokio::test]
async fn test_delete_removes_everything() {
    let h = harness();
    h.registry
        .insert(shell_app(&h.config, "victim", 26203))
        .unwrap();
    h.supervisor.start("victim").await.unwrap();

    h.pipeline.delete("victim").await.unwrap();

    assert!(!h.supervisor.is_running("victim"));
    assert!(!h.config.app_dir("victim").exists());
    assert!(!h.registry.contains("victim").unwrap());

    let err = h.pipeline.delete("victim").await.unwrap_err();
    assert!(matches!(err, Error::AppMissing(_)));
}

#[tokio::test]
async fn test_webhook_requires_configured_secret() {
    let h = harness();
    h.registry
        .insert(shell_app(&h.config, "hooked", 26204))
        .unwrap();

    let err = h
        .webhook
        .redeploy("hooked", b"{}", Some("sha256=00"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WebhookNotConfigured(_)));
}

#[tokio::test]
async fn test_webhook_bad_signature_leaves_app_untouched() {
    let h = harness();
    let mut app = shell_app(&h.config, "signed", 26205);
    app.webhook_secret = Some(b"abc".to_vec());
    h.registry.insert(app).unwrap();

    let body = b"{\"ref\":\"refs/heads/main\"}";
    // signature computed with the wrong secret
    let mut mac = Hmac::<Sha256>::new_from_slice(b"zzz").unwrap();
    mac.update(body);
    let header = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

    let before = h.registry.get("signed").unwrap();
    let err = h
        .webhook
        .redeploy("signed", body, Some(&header))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidWebhookSignature));

    let after = h.registry.get("signed").unwrap();
    assert_eq!(after.status, before.status);
    assert_eq!(after.versions.len(), before.versions.len());
    assert!(!h.supervisor.is_running("signed"));
}

#[tokio::test]
async fn test_deploy_node_app_end_to_end() {
    // needs a real node toolchain; skip quietly where absent
    if which::which("node").is_err() || which::which("npm").is_err() {
        return;
    }

    let h = harness();
    let archive = make_archive(&[
        (
            "package.json",
            br#"{"name":"svc","version":"1.0.0","scripts":{"start":"node server.js"}}"# as &[u8],
        ),
        (
            "server.js",
            b"require('http').createServer((req,res)=>res.end('ok')).listen(process.env.PORT);",
        ),
    ]);

    let app = h
        .pipeline
        .deploy("svc", DeploySource::Archive(archive.clone()))
        .await
        .unwrap();
    assert_eq!(app.kind, AppKind::Node);
    assert!(app.port >= h.config.port_floor);
    assert_eq!(app.status, AppStatus::Running);
    assert_eq!(app.versions.len(), 1);
    assert_eq!(app.start_spec.command, "node");

    // deploy -> delete -> deploy again with the same name succeeds with a
    // fresh history
    h.pipeline.delete("svc").await.unwrap();
    let again = h
        .pipeline
        .deploy("svc", DeploySource::Archive(archive))
        .await
        .unwrap();
    assert_eq!(again.versions.len(), 1);
    h.pipeline.delete("svc").await.unwrap();
}
