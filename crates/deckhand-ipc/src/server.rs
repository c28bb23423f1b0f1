//! IPC Server - Unix socket server for the daemon

use deckhand_core::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info};

use crate::protocol::{Request, Response};

/// Maximum IPC message size. Archive deploys travel inline, so this is
/// generous; anything bigger is a hostile or broken client.
const MAX_MESSAGE_SIZE: u64 = 256 * 1024 * 1024;

/// IPC Server for the daemon
pub struct IpcServer {
    socket_path: PathBuf,
    listener: UnixListener,
}

impl IpcServer {
    /// Bind to a Unix socket, replacing any stale socket file.
    pub async fn bind(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)
            .map_err(|e| Error::ipc(format!("failed to bind socket: {}", e)))?;

        // owner-only: the socket is the whole control surface
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| Error::ipc(format!("failed to set socket permissions: {}", e)))?;
        }

        info!("IPC server listening on {}", socket_path.display());

        Ok(Self {
            socket_path: socket_path.to_path_buf(),
            listener,
        })
    }

    pub async fn accept(&self) -> Result<IpcConnection> {
        let (stream, _) = self
            .listener
            .accept()
            .await
            .map_err(|e| Error::ipc(format!("accept failed: {}", e)))?;
        debug!("accepted IPC connection");
        Ok(IpcConnection::new(stream))
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                error!("failed to remove socket file: {}", e);
            }
        }
    }
}

/// A single IPC connection
pub struct IpcConnection {
    stream: UnixStream,
}

impl IpcConnection {
    pub fn new(stream: UnixStream) -> Self {
        Self { stream }
    }

    /// Read one newline-delimited request; `None` when the peer hung up.
    pub async fn read_request(&mut self) -> Result<Option<Request>> {
        let limited = (&mut self.stream).take(MAX_MESSAGE_SIZE);
        let mut reader = BufReader::new(limited);
        let mut line = String::new();

        match reader.read_line(&mut line).await {
            Ok(0) => Ok(None),
            Ok(_) => {
                let request: Request = serde_json::from_str(line.trim())
                    .map_err(|e| Error::ipc(format!("invalid request: {}", e)))?;
                Ok(Some(request))
            }
            Err(e) => Err(Error::ipc(format!("read error: {}", e))),
        }
    }

    pub async fn send_response(&mut self, response: &Response) -> Result<()> {
        let mut json = serde_json::to_string(response)?;
        json.push('\n');

        self.stream
            .write_all(json.as_bytes())
            .await
            .map_err(|e| Error::ipc(format!("write error: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| Error::ipc(format!("flush error: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_server_bind_and_cleanup() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();
        assert!(socket_path.exists());

        drop(server);
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_request_response_roundtrip() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let server = IpcServer::bind(&socket_path).await.unwrap();

        let client_path = socket_path.clone();
        let client = tokio::spawn(async move {
            let mut stream = UnixStream::connect(&client_path).await.unwrap();
            stream.write_all(b"{\"type\":\"ping\"}\n").await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            line
        });

        let mut conn = server.accept().await.unwrap();
        let request = conn.read_request().await.unwrap().unwrap();
        assert!(matches!(request, Request::Ping));
        conn.send_response(&Response::Pong).await.unwrap();

        let line = client.await.unwrap();
        assert!(line.contains("pong"));
    }
}
