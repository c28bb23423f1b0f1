//! Runtime configuration, read from the environment

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::constants::*;
use crate::error::Result;

/// Runtime configuration for the daemon and its subsystems.
///
/// Every tunable has a default from the constants module and can be
/// overridden through a `DECKHAND_*` environment variable.
#[derive(Debug, Clone)]
pub struct Config {
    /// Platform home; everything lives under here
    pub home: PathBuf,
    /// First port considered by the allocator
    pub port_floor: u16,
    /// Max crash-restart attempts inside one window
    pub auto_restart_max: u32,
    /// Crash-restart window
    pub auto_restart_window: Duration,
    /// Delay before a crash-restart attempt
    pub restart_backoff: Duration,
    /// Grace period between SIGTERM and SIGKILL
    pub stop_grace: Duration,
    /// Log rotation threshold in bytes
    pub log_max_size: u64,
    /// Rotated log files kept per app
    pub log_max_files: usize,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or(default),
        Err(_) => default,
    }
}

impl Config {
    /// Build the configuration from the environment.
    pub fn from_env() -> Self {
        Self::with_home(deckhand_home())
    }

    /// Build the configuration with an explicit home directory.
    pub fn with_home(home: PathBuf) -> Self {
        let grace_secs: u64 = env_parse("DECKHAND_STOP_GRACE_SECS", DEFAULT_STOP_GRACE_SECS)
            .clamp(STOP_GRACE_MIN_SECS, STOP_GRACE_MAX_SECS);
        let max_size_mb: u64 = env_parse(
            "DECKHAND_LOG_MAX_SIZE_MB",
            DEFAULT_LOG_MAX_SIZE / (1024 * 1024),
        );

        Self {
            home,
            port_floor: env_parse("DECKHAND_PORT_FLOOR", DEFAULT_PORT_FLOOR),
            auto_restart_max: env_parse("DECKHAND_AUTO_RESTART_MAX", DEFAULT_AUTO_RESTART_MAX),
            auto_restart_window: Duration::from_secs(env_parse(
                "DECKHAND_AUTO_RESTART_WINDOW_SECS",
                DEFAULT_AUTO_RESTART_WINDOW_SECS,
            )),
            restart_backoff: Duration::from_secs(RESTART_BACKOFF_SECS),
            stop_grace: Duration::from_secs(grace_secs),
            log_max_size: max_size_mb * 1024 * 1024,
            log_max_files: env_parse("DECKHAND_LOG_MAX_FILES", DEFAULT_LOG_MAX_FILES),
        }
    }

    /// Root directory for app working directories
    pub fn apps_dir(&self) -> PathBuf {
        self.home.join(APPS_DIR)
    }

    /// Directory holding the registry document
    pub fn data_dir(&self) -> PathBuf {
        self.home.join(DATA_DIR)
    }

    /// Per-app log directory
    pub fn logs_dir(&self) -> PathBuf {
        self.home.join(LOGS_DIR)
    }

    /// Registry document path
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir().join(REGISTRY_FILE)
    }

    /// Daemon IPC socket path
    pub fn socket_path(&self) -> PathBuf {
        self.home.join(SOCKET_FILE)
    }

    /// Top-level directory for one app (working dir + version snapshots)
    pub fn app_dir(&self, name: &str) -> PathBuf {
        self.apps_dir().join(name)
    }

    /// Version snapshot directory for one app
    pub fn versions_dir(&self, name: &str) -> PathBuf {
        self.app_dir(name).join(VERSIONS_DIR)
    }

    /// Primary log file for one app
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.logs_dir().join(format!("{}.log", name))
    }

    /// Create the platform directory tree if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.apps_dir(), self.data_dir(), self.logs_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Does a resolved path stay inside the apps root?
    pub fn within_apps_root(&self, path: &Path) -> bool {
        path.starts_with(self.apps_dir())
    }
}
