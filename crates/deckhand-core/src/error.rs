//! Error types for Deckhand

use std::path::PathBuf;

/// Deckhand error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Validation
    #[error("Invalid app name: {0}")]
    InvalidName(String),

    #[error("Archive entry escapes destination: {0}")]
    UnsafeArchivePath(String),

    #[error("Cannot classify project at {0}")]
    UnclassifiableProject(PathBuf),

    #[error("No webhook secret configured for app: {0}")]
    WebhookNotConfigured(String),

    #[error("Webhook signature verification failed")]
    InvalidWebhookSignature,

    // State
    #[error("App already exists: {0}")]
    AppAlreadyExists(String),

    #[error("App not found: {0}")]
    AppMissing(String),

    #[error("App already running: {0}")]
    AlreadyRunning(String),

    #[error("App not running: {0}")]
    NotRunning(String),

    #[error("Version not found: {0}")]
    VersionMissing(String),

    #[error("App is already at version {0}")]
    AlreadyAtVersion(String),

    #[error("Working directory missing: {0}")]
    WorkingDirGone(PathBuf),

    // Resource
    #[error("No free port found below {}", crate::constants::PORT_CEILING)]
    NoFreePort,

    #[error("Dependency install failed: {0}")]
    InstallFailed(String),

    #[error("Git operation failed: {0}")]
    CloneFailed(String),

    #[error("Archive extraction failed: {0}")]
    ExtractionFailed(String),

    // System
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Deckhand
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn ipc<S: Into<String>>(msg: S) -> Self {
        Error::Ipc(msg.into())
    }

    pub fn spawn<S: Into<String>>(msg: S) -> Self {
        Error::SpawnFailed(msg.into())
    }

    /// Short machine-readable kind, surfaced to callers instead of stack traces.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidName(_) => "invalid_name",
            Error::UnsafeArchivePath(_) => "unsafe_archive_path",
            Error::UnclassifiableProject(_) => "unclassifiable_project",
            Error::WebhookNotConfigured(_) => "webhook_not_configured",
            Error::InvalidWebhookSignature => "invalid_webhook_signature",
            Error::AppAlreadyExists(_) => "app_already_exists",
            Error::AppMissing(_) => "app_missing",
            Error::AlreadyRunning(_) => "already_running",
            Error::NotRunning(_) => "not_running",
            Error::VersionMissing(_) => "version_missing",
            Error::AlreadyAtVersion(_) => "already_at_version",
            Error::WorkingDirGone(_) => "working_dir_gone",
            Error::NoFreePort => "no_free_port",
            Error::InstallFailed(_) => "install_failed",
            Error::CloneFailed(_) => "clone_failed",
            Error::ExtractionFailed(_) => "extraction_failed",
            Error::SpawnFailed(_) => "spawn_failed",
            Error::Ipc(_) => "ipc",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }
}
