//! Health commands: per-app probe and platform report

use anyhow::{bail, Result};
use colored::Colorize;
use deckhand_core::HealthStatus;
use deckhand_ipc::{Request, Response};

use crate::commands::{expect_ok, get_client};

pub async fn execute(name: Option<String>) -> Result<()> {
    match name {
        Some(name) => app_health(name).await,
        None => platform_health().await,
    }
}

async fn app_health(name: String) -> Result<()> {
    let client = get_client();
    let response = client.send(&Request::Health { name }).await?;
    match expect_ok(response)? {
        Response::Health { record } => {
            let status = match record.status {
                HealthStatus::Healthy => record.status.to_string().green(),
                HealthStatus::Unhealthy => record.status.to_string().red(),
                _ => record.status.to_string().dimmed(),
            };
            print!("{}", status);
            if let Some(ms) = record.response_time_ms {
                print!(" ({}ms)", ms);
            }
            println!(
                " at {}",
                record.checked_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            Ok(())
        }
        _ => bail!("unexpected response from daemon"),
    }
}

async fn platform_health() -> Result<()> {
    let client = get_client();
    let response = client.send(&Request::PlatformHealth).await?;
    match expect_ok(response)? {
        Response::Platform { report } => {
            let flag = |ok: bool| {
                if ok {
                    "ok".green()
                } else {
                    "unreachable".red()
                }
            };
            println!("{}: {}s", "uptime".bold(), report.uptime_secs);
            println!("{}: {}", "registry".bold(), flag(report.registry_ok));
            println!("{}: {}", "apps root".bold(), flag(report.apps_root_ok));
            println!("{}: {}", "apps".bold(), report.app_count);
            Ok(())
        }
        _ => bail!("unexpected response from daemon"),
    }
}
