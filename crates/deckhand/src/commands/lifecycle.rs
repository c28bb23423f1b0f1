//! Start/stop/restart/delete commands

use anyhow::{bail, Result};
use deckhand_ipc::{Request, Response};

use crate::commands::{expect_ok, get_client};
use crate::output::print_success;

pub async fn start(name: String) -> Result<()> {
    run(Request::Start { name }).await
}

pub async fn stop(name: String) -> Result<()> {
    run(Request::Stop { name }).await
}

pub async fn restart(name: String) -> Result<()> {
    run(Request::Restart { name }).await
}

pub async fn delete(name: String) -> Result<()> {
    run(Request::Delete { name }).await
}

pub async fn kill() -> Result<()> {
    run(Request::Kill).await
}

async fn run(request: Request) -> Result<()> {
    let client = get_client();
    let response = client.send(&request).await?;
    match expect_ok(response)? {
        Response::Ok { message } => {
            print_success(&message);
            Ok(())
        }
        _ => bail!("unexpected response from daemon"),
    }
}
