//! IPC Client - Unix socket client for the CLI and web layer

use deckhand_core::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::info;

use crate::protocol::{Request, Response};

/// IPC client speaking the newline-delimited JSON protocol
pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn is_daemon_running(&self) -> bool {
        self.socket_path.exists()
    }

    async fn connect(&self) -> Result<UnixStream> {
        if !self.socket_path.exists() {
            return Err(Error::ipc("daemon is not running"));
        }
        UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| Error::ipc(format!("failed to connect to daemon: {}", e)))
    }

    /// Connect, starting the daemon first if its socket is missing.
    async fn connect_or_start(&self) -> Result<UnixStream> {
        if let Ok(stream) = self.connect().await {
            return Ok(stream);
        }

        info!("daemon not running, starting it");
        self.start_daemon()?;

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(stream) = self.connect().await {
                return Ok(stream);
            }
        }
        Err(Error::ipc("daemon failed to start within timeout"))
    }

    /// Spawn `deckhandd`, preferring a binary next to our own executable.
    fn start_daemon(&self) -> Result<()> {
        let exe = std::env::current_exe()?;
        let sibling = exe
            .parent()
            .map(|dir| dir.join("deckhandd"))
            .filter(|p| p.exists());
        let daemon = sibling.unwrap_or_else(|| PathBuf::from("deckhandd"));

        std::process::Command::new(&daemon)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| Error::ipc(format!("failed to start daemon: {}", e)))?;
        Ok(())
    }

    /// Send one request and read one response.
    pub async fn send(&self, request: &Request) -> Result<Response> {
        let mut stream = self.connect_or_start().await?;

        let mut json = serde_json::to_string(request)?;
        json.push('\n');
        stream
            .write_all(json.as_bytes())
            .await
            .map_err(|e| Error::ipc(format!("write error: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| Error::ipc(format!("flush error: {}", e)))?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .await
            .map_err(|e| Error::ipc(format!("read error: {}", e)))?;

        let response: Response = serde_json::from_str(line.trim())
            .map_err(|e| Error::ipc(format!("invalid response: {}", e)))?;
        Ok(response)
    }

    pub async fn ping(&self) -> Result<bool> {
        if !self.is_daemon_running() {
            return Ok(false);
        }
        match self.send(&Request::Ping).await {
            Ok(Response::Pong) => Ok(true),
            Ok(_) => Ok(false),
            Err(_) => Ok(false),
        }
    }
}
