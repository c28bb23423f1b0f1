//! Core types for Deckhand

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Regex pattern for valid app names: lowercase alphanumeric and hyphens
static APP_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("Invalid app name regex"));

/// Validate an app name. Names are path components, so anything outside
/// `[a-z0-9-]` is rejected to prevent traversal.
pub fn validate_app_name(name: &str) -> bool {
    !name.is_empty() && APP_NAME_REGEX.is_match(name)
}

/// Normalize a requested name into a valid app name: lowercase, with runs
/// of anything outside `[a-z0-9-]` collapsed into a single hyphen.
pub fn normalize_app_name(requested: &str) -> Result<String> {
    let lowered = requested.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last_was_dash = false;
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            out.push(c);
            last_was_dash = c == '-';
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    let out = out.trim_matches('-').to_string();
    if !validate_app_name(&out) {
        return Err(Error::InvalidName(requested.to_string()));
    }
    Ok(out)
}

/// Application kind, decided by the classifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    Node,
    Static,
}

impl AppKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppKind::Node => "node",
            AppKind::Static => "static",
        }
    }
}

impl std::fmt::Display for AppKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AppKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "node" => Ok(AppKind::Node),
            "static" => Ok(AppKind::Static),
            _ => Err(Error::InvalidName(format!("unknown app kind: {}", s))),
        }
    }
}

/// Application status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    Stopped,
    Running,
    Stopping,
    Crashed,
}

impl AppStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Stopped => "stopped",
            AppStatus::Running => "running",
            AppStatus::Stopping => "stopping",
            AppStatus::Crashed => "crashed",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, AppStatus::Running | AppStatus::Stopping)
    }
}

impl std::fmt::Display for AppStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a version came to exist
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeployMethod {
    Archive,
    Git,
    Webhook,
    Manual,
}

impl DeployMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployMethod::Archive => "archive",
            DeployMethod::Git => "git",
            DeployMethod::Webhook => "webhook",
            DeployMethod::Manual => "manual",
        }
    }
}

impl std::fmt::Display for DeployMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health probe outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Unknown,
    Running,
    Healthy,
    Unhealthy,
    Stopped,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Running => "running",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last known health of an app
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

impl HealthRecord {
    pub fn now(status: HealthStatus) -> Self {
        Self {
            status,
            checked_at: Utc::now(),
            response_time_ms: None,
        }
    }

    pub fn healthy(response_time_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            checked_at: Utc::now(),
            response_time_ms: Some(response_time_ms),
        }
    }
}

/// Point-in-time resource usage of one supervised child
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub memory_mb: u64,
}

/// The exact `(command, args)` pair used to spawn the child process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl StartSpec {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Start spec for a static app: a file server child bound to the
    /// assigned port, so static apps supervise like any other child.
    pub fn static_server(port: u16) -> Self {
        Self {
            command: "npx".to_string(),
            args: vec!["serve".to_string(), "-l".to_string(), port.to_string()],
        }
    }

    pub fn display(&self) -> String {
        let mut parts = vec![self.command.clone()];
        parts.extend(self.args.clone());
        parts.join(" ")
    }
}

/// Where an app's source lives when it was deployed from git
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitSource {
    pub url: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// An immutable snapshot of an app's working directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    /// Monotonic sortable id, `v<unix-millis>`
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub method: DeployMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<GitSource>,
    pub snapshot_dir: PathBuf,
}

/// A deployed application, the unit the supervisor owns end-to-end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    pub kind: AppKind,
    /// The live tree the child runs from (the classifier's real root)
    pub workdir: PathBuf,
    pub port: u16,
    pub current_version: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_autorestart")]
    pub autorestart: bool,
    /// Raw secret bytes; compared in constant time, never sent on read paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<Vec<u8>>,
    #[serde(default = "default_status")]
    pub status: AppStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthRecord>,
    pub start_spec: StartSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<GitSource>,
    #[serde(default)]
    pub versions: Vec<Version>,
    pub created_at: DateTime<Utc>,
}

fn default_autorestart() -> bool {
    true
}

fn default_status() -> AppStatus {
    AppStatus::Stopped
}

impl App {
    pub fn version(&self, id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Read-path view of the app: everything but the secret.
    pub fn summary(&self) -> AppSummary {
        AppSummary {
            name: self.name.clone(),
            kind: self.kind,
            port: self.port,
            status: self.status,
            current_version: self.current_version.clone(),
            version_count: self.versions.len(),
            autorestart: self.autorestart,
            webhook_configured: self.webhook_secret.is_some(),
            health: self.health.clone(),
            resources: None,
            created_at: self.created_at,
        }
    }
}

/// What list/show hand back to callers; never carries the webhook secret
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSummary {
    pub name: String,
    pub kind: AppKind,
    pub port: u16,
    pub status: AppStatus,
    pub current_version: String,
    pub version_count: usize,
    pub autorestart: bool,
    pub webhook_configured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSample>,
    pub created_at: DateTime<Utc>,
}

/// Platform-level health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformReport {
    pub uptime_secs: u64,
    pub registry_ok: bool,
    pub apps_root_ok: bool,
    pub app_count: usize,
}

/// Events published by the supervisor and observers
#[derive(Debug, Clone)]
pub enum AppEvent {
    Status { name: String, status: AppStatus },
    Health { name: String, record: HealthRecord },
    Resources { samples: HashMap<String, ResourceSample> },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_app() -> App {
        App {
            name: "web".to_string(),
            kind: AppKind::Node,
            workdir: PathBuf::from("/srv/deckhand/apps/web"),
            port: 5200,
            current_version: "v1700000000000".to_string(),
            env: HashMap::new(),
            autorestart: true,
            webhook_secret: Some(b"secret".to_vec()),
            status: AppStatus::Stopped,
            health: None,
            start_spec: StartSpec::new("node", vec!["server.js".to_string()]),
            source: None,
            versions: vec![Version {
                id: "v1700000000000".to_string(),
                created_at: Utc::now(),
                method: DeployMethod::Archive,
                source: None,
                snapshot_dir: PathBuf::from("/srv/deckhand/apps/web/versions/v1700000000000"),
            }],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_app_name() {
        assert!(validate_app_name("myapp"));
        assert!(validate_app_name("my-app-2"));
        assert!(!validate_app_name(""));
        assert!(!validate_app_name("MyApp"));
        assert!(!validate_app_name("my_app"));
        assert!(!validate_app_name("../etc/passwd"));
        assert!(!validate_app_name("my app"));
    }

    #[test]
    fn test_normalize_app_name() {
        assert_eq!(normalize_app_name("My App").unwrap(), "my-app");
        assert_eq!(normalize_app_name("hello_world!!2").unwrap(), "hello-world-2");
        assert_eq!(normalize_app_name("already-fine").unwrap(), "already-fine");
        assert_eq!(normalize_app_name("__x__").unwrap(), "x");
        assert!(normalize_app_name("").is_err());
        assert!(normalize_app_name("___").is_err());
        assert!(normalize_app_name("!!!").is_err());
    }

    #[test]
    fn test_normalize_collapses_runs() {
        // A run of invalid characters becomes a single hyphen
        assert_eq!(normalize_app_name("a!!@@##b").unwrap(), "a-b");
    }

    #[test]
    fn test_status_roundtrip() {
        let json = serde_json::to_string(&AppStatus::Stopping).unwrap();
        assert_eq!(json, "\"stopping\"");
        let back: AppStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AppStatus::Stopping);
    }

    #[test]
    fn test_app_summary_hides_secret() {
        let app = sample_app();
        let summary = app.summary();
        assert!(summary.webhook_configured);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_app_unknown_fields_discarded() {
        let app = sample_app();
        let mut value = serde_json::to_value(&app).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("legacy_field".to_string(), serde_json::json!({"x": 1}));
        let back: App = serde_json::from_value(value).unwrap();
        assert_eq!(back.name, "web");
        let rejson = serde_json::to_string(&back).unwrap();
        assert!(!rejson.contains("legacy_field"));
    }

    #[test]
    fn test_version_lookup() {
        let app = sample_app();
        assert!(app.version("v1700000000000").is_some());
        assert!(app.version("v1").is_none());
    }

    #[test]
    fn test_static_start_spec() {
        let spec = StartSpec::static_server(5201);
        assert_eq!(spec.command, "npx");
        assert!(spec.args.contains(&"5201".to_string()));
        assert_eq!(spec.display(), "npx serve -l 5201");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("node".parse::<AppKind>().unwrap(), AppKind::Node);
        assert_eq!("static".parse::<AppKind>().unwrap(), AppKind::Static);
        assert!("python".parse::<AppKind>().is_err());
    }
}
