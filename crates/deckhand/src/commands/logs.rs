//! Logs command

use anyhow::{bail, Result};
use deckhand_ipc::{Request, Response};

use crate::commands::{expect_ok, get_client};

pub async fn execute(name: String, lines: usize) -> Result<()> {
    let client = get_client();
    let response = client.send(&Request::Logs { name, lines }).await?;
    match expect_ok(response)? {
        Response::LogLines { lines } => {
            for line in lines {
                println!("{}", line);
            }
            Ok(())
        }
        _ => bail!("unexpected response from daemon"),
    }
}
