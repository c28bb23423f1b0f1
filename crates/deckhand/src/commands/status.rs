//! List, show, and ping commands

use anyhow::{bail, Result};
use deckhand_ipc::{Request, Response};

use crate::commands::{expect_ok, get_client};
use crate::output::{print_app_detail, print_app_table, print_error, print_success};

pub async fn list() -> Result<()> {
    let client = get_client();
    let response = client.send(&Request::List).await?;
    match expect_ok(response)? {
        Response::Apps { apps } => {
            print_app_table(&apps);
            Ok(())
        }
        _ => bail!("unexpected response from daemon"),
    }
}

pub async fn show(name: String) -> Result<()> {
    let client = get_client();
    let response = client.send(&Request::Show { name }).await?;
    match expect_ok(response)? {
        Response::App { app } => {
            print_app_detail(&app);
            Ok(())
        }
        _ => bail!("unexpected response from daemon"),
    }
}

pub async fn ping() -> Result<()> {
    let client = get_client();
    if client.ping().await? {
        print_success("daemon is alive");
        Ok(())
    } else {
        print_error("daemon is not running");
        bail!("daemon is not running");
    }
}
