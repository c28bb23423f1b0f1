//! Versions and rollback commands

use anyhow::{bail, Result};
use colored::Colorize;
use deckhand_ipc::{Request, Response};

use crate::commands::{expect_ok, get_client};
use crate::output::print_success;

pub async fn list(name: String) -> Result<()> {
    let client = get_client();
    let response = client.send(&Request::Versions { name }).await?;
    match expect_ok(response)? {
        Response::Versions { current, versions } => {
            for version in versions {
                let marker = if version.id == current { "*" } else { " " };
                let source = version
                    .source
                    .as_ref()
                    .and_then(|s| s.commit.as_deref())
                    .unwrap_or("-");
                println!(
                    "{} {:<18} {:<8} {:<10} {}",
                    marker.green().bold(),
                    version.id,
                    version.method,
                    source,
                    version.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            Ok(())
        }
        _ => bail!("unexpected response from daemon"),
    }
}

pub async fn rollback(name: String, version: String) -> Result<()> {
    let client = get_client();
    let response = client.send(&Request::Rollback { name, version }).await?;
    match expect_ok(response)? {
        Response::App { app } => {
            print_success(&format!("{} is now at {}", app.name, app.current_version));
            Ok(())
        }
        _ => bail!("unexpected response from daemon"),
    }
}
