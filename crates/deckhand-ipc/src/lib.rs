//! Deckhand IPC - Unix socket protocol between the CLI, the web layer,
//! and the daemon

mod client;
mod protocol;
mod server;

pub use client::IpcClient;
pub use protocol::{DeploySource, Request, Response};
pub use server::{IpcConnection, IpcServer};
