//! Webhook secret configuration

use anyhow::{bail, Result};
use deckhand_ipc::{Request, Response};

use crate::cli::WebhookCommand;
use crate::commands::{expect_ok, get_client};
use crate::output::print_success;

pub async fn execute(command: WebhookCommand) -> Result<()> {
    let request = match command {
        WebhookCommand::SetSecret { name, secret } => Request::SetWebhookSecret {
            name,
            secret: Some(secret),
        },
        WebhookCommand::Clear { name } => Request::SetWebhookSecret { name, secret: None },
    };

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
