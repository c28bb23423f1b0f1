//! Wiring between a child's stdio, the log file, and live subscribers

use deckhand_core::Result;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::rotation::RotationConfig;
use crate::topic::LogTopic;
use crate::writer::{LogSource, LogWriter};

/// One app's open log stream: a single rotating file writer plus the
/// app's live topic. Shared by the stdout and stderr capture tasks.
pub struct AppLog {
    writer: Mutex<LogWriter>,
    topic: Arc<LogTopic>,
}

impl AppLog {
    pub fn open(path: PathBuf, config: RotationConfig, topic: Arc<LogTopic>) -> Result<Self> {
        Ok(Self {
            writer: Mutex::new(LogWriter::open(path, config)?),
            topic,
        })
    }

    /// Append one line and fan it out. Write failures are logged, not
    /// propagated; losing a log line must not take the app down.
    pub fn write(&self, source: LogSource, line: &str) {
        match self.writer.lock().append(source, line) {
            Ok(formatted) => self.topic.publish(&formatted),
            Err(e) => warn!("failed to write log line: {}", e),
        }
    }

    pub fn topic(&self) -> &Arc<LogTopic> {
        &self.topic
    }
}

/// Capture tasks draining a child's stdout/stderr into an [`AppLog`]
pub struct LogCapture;

impl LogCapture {
    /// Spawn one task per stream. Lines from a single stream are appended
    /// in the order the child produced them.
    pub fn spawn(
        log: Arc<AppLog>,
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
    ) -> (Option<JoinHandle<()>>, Option<JoinHandle<()>>) {
        let stdout_handle = stdout.map(|out| {
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let mut lines = BufReader::new(out).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log.write(LogSource::Stdout, &line);
                }
            })
        });

        let stderr_handle = stderr.map(|err| {
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let mut lines = BufReader::new(err).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log.write(LogSource::Stderr, &line);
                }
            })
        });

        (stdout_handle, stderr_handle)
    }
}
