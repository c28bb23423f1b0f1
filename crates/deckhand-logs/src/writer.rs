//! Rotating log writer

use chrono::Utc;
use deckhand_core::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::rotation::RotationConfig;

/// Where a log line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Stdout,
    Stderr,
    System,
}

impl LogSource {
    /// Origin marker embedded in each line
    pub fn marker(&self) -> &'static str {
        match self {
            LogSource::Stdout => "out",
            LogSource::Stderr => "err",
            LogSource::System => "sys",
        }
    }
}

/// Append-only writer for one app's primary log file.
///
/// Rotation happens when the primary file has reached the configured size,
/// both at open time and whenever a write crosses the threshold: the file
/// numbered `max_files` is deleted, every `.k` becomes `.k+1`, and the
/// primary becomes `.1`.
pub struct LogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    config: RotationConfig,
    current_size: u64,
}

impl LogWriter {
    pub fn open(path: PathBuf, config: RotationConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Rotate a full file away before appending to it
        if let Ok(meta) = fs::metadata(&path) {
            if meta.len() >= config.max_size_bytes {
                rotate_files(&path, config.max_files)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let current_size = file.metadata()?.len();

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            config,
            current_size,
        })
    }

    /// Append one tagged line; returns the formatted line for fan-out.
    pub fn append(&mut self, source: LogSource, line: &str) -> Result<String> {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        let formatted = format!("[{}] [{}] {}", timestamp, source.marker(), line);

        self.writer.write_all(formatted.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.current_size += formatted.len() as u64 + 1;

        if self.current_size >= self.config.max_size_bytes {
            self.rotate()?;
        }

        Ok(formatted)
    }

    fn rotate(&mut self) -> Result<()> {
        debug!(path = %self.path.display(), "rotating log file");
        self.writer.flush()?;
        rotate_files(&self.path, self.config.max_files)?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.current_size = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }
}

/// Shift rotated files up by one: delete `.N`, rename `.k` to `.k+1`,
/// move the primary to `.1`.
fn rotate_files(path: &Path, max_files: usize) -> std::io::Result<()> {
    let last = rotated_path(path, max_files);
    if last.exists() {
        fs::remove_file(&last)?;
    }
    for k in (1..max_files).rev() {
        let from = rotated_path(path, k);
        if from.exists() {
            fs::rename(&from, rotated_path(path, k + 1))?;
        }
    }
    if path.exists() {
        fs::rename(path, rotated_path(path, 1))?;
    }
    Ok(())
}

/// Path of a rotated log file
pub(crate) fn rotated_path(base: &Path, index: usize) -> PathBuf {
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.with_file_name(format!("{}.{}", name, index))
}
