//! Command implementations

pub mod deploy;
pub mod env;
pub mod health;
pub mod lifecycle;
pub mod logs;
pub mod status;
pub mod versions;
pub mod webhook;

use anyhow::{bail, Result};
use deckhand_core::Config;
use deckhand_ipc::{IpcClient, Response};

use crate::output::print_error;

/// Client bound to the configured daemon socket
pub fn get_client() -> IpcClient {
    IpcClient::new(Config::from_env().socket_path())
}

/// Turn an error response into a process failure; anything else passes
/// through for the caller to render.
pub fn expect_ok(response: Response) -> Result<Response> {
    if let Response::Error { kind, message } = response {
        print_error(&message);
        bail!("{} ({})", message, kind);
    }
    Ok(response)
}
