//! IPC Protocol - Request/Response types

use deckhand_core::{AppSummary, Error, HealthRecord, PlatformReport, Version};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a deploy gets its application tree from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeploySource {
    /// Gzipped tarball contents
    Archive { data: Vec<u8> },
    /// Shallow clone of a branch
    Git { url: String, branch: Option<String> },
}

/// IPC Request to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Check if daemon is alive
    Ping,

    /// Deploy a new app
    Deploy { name: String, source: DeploySource },

    /// List all apps with cached health and resources
    List,

    /// Detailed view of one app
    Show { name: String },

    /// Stop, remove working dir, and unregister
    Delete { name: String },

    /// Start a stopped app
    Start { name: String },

    /// Stop a running app
    Stop { name: String },

    /// Restart an app
    Restart { name: String },

    /// Recent lines from the primary log file
    Logs { name: String, lines: usize },

    /// Version history of an app
    Versions { name: String },

    /// Roll back to a previous version
    Rollback { name: String, version: String },

    /// Read the app's configured environment
    GetEnv { name: String },

    /// Replace the app's configured environment (no automatic restart)
    SetEnv {
        name: String,
        env: HashMap<String, String>,
    },

    /// Set or clear the webhook secret
    SetWebhookSecret {
        name: String,
        secret: Option<String>,
    },

    /// Deliver a webhook: raw body plus the signature header value
    Webhook {
        name: String,
        body: Vec<u8>,
        signature: Option<String>,
    },

    /// On-demand health probe of one app
    Health { name: String },

    /// Platform-level health report
    PlatformHealth,

    /// Stop every app and shut the daemon down
    Kill,
}

/// IPC Response from the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,

    Ok { message: String },

    Error { kind: String, message: String },

    Apps { apps: Vec<AppSummary> },

    App { app: AppSummary },

    Deployed { app: AppSummary },

    LogLines { lines: Vec<String> },

    Versions {
        current: String,
        versions: Vec<Version>,
    },

    Env { env: HashMap<String, String> },

    Health { record: HealthRecord },

    Platform { report: PlatformReport },
}

impl Response {
    pub fn ok<S: Into<String>>(message: S) -> Self {
        Response::Ok {
            message: message.into(),
        }
    }

    pub fn error(err: &Error) -> Self {
        Response::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}
