//! Constants and default values for Deckhand

use std::path::PathBuf;

/// Default Deckhand home directory name
pub const DECKHAND_DIR: &str = ".deckhand";

/// Default socket file name
pub const SOCKET_FILE: &str = "deckhandd.sock";

/// Apps directory name (working directories and version snapshots)
pub const APPS_DIR: &str = "apps";

/// Data directory name (registry document)
pub const DATA_DIR: &str = "data";

/// Registry document file name
pub const REGISTRY_FILE: &str = "apps.json";

/// Log directory name
pub const LOGS_DIR: &str = "logs";

/// Versions subdirectory inside each app directory
pub const VERSIONS_DIR: &str = "versions";

/// First port considered for assignment
pub const DEFAULT_PORT_FLOOR: u16 = 5200;

/// Port scan gives up here
pub const PORT_CEILING: u16 = 65000;

/// Default max crash-restart attempts inside one window
pub const DEFAULT_AUTO_RESTART_MAX: u32 = 5;

/// Default crash-restart window in seconds
pub const DEFAULT_AUTO_RESTART_WINDOW_SECS: u64 = 300;

/// Delay before a crash-restart attempt
pub const RESTART_BACKOFF_SECS: u64 = 2;

/// A run of at least this many seconds clears the restart counter
pub const STABLE_RUN_SECS: u64 = 30;

/// Default grace period between SIGTERM and SIGKILL
pub const DEFAULT_STOP_GRACE_SECS: u64 = 10;

/// Stop grace bounds
pub const STOP_GRACE_MIN_SECS: u64 = 5;
pub const STOP_GRACE_MAX_SECS: u64 = 30;

/// Default log max size in bytes (10MiB)
pub const DEFAULT_LOG_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// Default max rotated log files to keep
pub const DEFAULT_LOG_MAX_FILES: usize = 5;

/// Health sweep interval in seconds
pub const HEALTH_INTERVAL_SECS: u64 = 60;

/// Per-request health probe timeout in seconds
pub const HEALTH_TIMEOUT_SECS: u64 = 3;

/// Resource sampling interval in seconds
pub const METRICS_INTERVAL_SECS: u64 = 2;

/// Directory entries never copied into version snapshots
pub const SNAPSHOT_SKIP: &[&str] = &[".git", "node_modules", VERSIONS_DIR];

/// Junk entries ignored when looking for the real project root
pub const JUNK_ENTRIES: &[&str] = &["__MACOSX", ".DS_Store", "Thumbs.db", ".gitkeep"];

/// Get the Deckhand home directory, honoring DECKHAND_HOME
pub fn deckhand_home() -> PathBuf {
    if let Ok(home) = std::env::var("DECKHAND_HOME") {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }
    dirs::home_dir()
        .map(|h| h.join(DECKHAND_DIR))
        .unwrap_or_else(|| PathBuf::from(DECKHAND_DIR))
}
