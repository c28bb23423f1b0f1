//! Tail reader for the primary log file

use deckhand_core::Result;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Reads the tail of an app's primary log file
pub struct LogReader {
    path: PathBuf,
}

impl LogReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the last N lines, seeking backwards from the end so large
    /// files are not read in full.
    pub fn tail(&self, n: usize) -> Result<Vec<String>> {
        if n == 0 || !self.path.exists() {
            return Ok(vec![]);
        }

        let mut file = File::open(&self.path)?;
        let file_size = file.metadata()?.len();
        if file_size == 0 {
            return Ok(vec![]);
        }

        let chunk_size = 8192u64;
        let mut lines: Vec<String> = Vec::new();
        let mut position = file_size;
        let mut partial = String::new();

        while position > 0 && lines.len() < n {
            let read_size = std::cmp::min(chunk_size, position);
            position -= read_size;

            file.seek(SeekFrom::Start(position))?;
            let mut buffer = vec![0u8; read_size as usize];
            file.read_exact(&mut buffer)?;

            let chunk = String::from_utf8_lossy(&buffer);
            let combined = format!("{}{}", chunk, partial);
            let mut chunk_lines: Vec<&str> = combined.lines().collect();

            // the first element may continue a line from the previous chunk
            if position > 0 && !chunk_lines.is_empty() {
                partial = chunk_lines.remove(0).to_string();
            } else {
                partial.clear();
            }

            for line in chunk_lines.into_iter().rev() {
                if lines.len() >= n {
                    break;
                }
                lines.push(line.to_string());
            }
        }

        if !partial.is_empty() && lines.len() < n {
            lines.push(partial);
        }

        lines.reverse();
        Ok(lines)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
