//! Output helpers for the CLI

use colored::Colorize;
use deckhand_core::{AppStatus, AppSummary, HealthStatus};

pub fn print_success(message: &str) {
    println!("{} {}", "[OK]".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERR]".red(), message);
}

fn status_cell(status: AppStatus) -> String {
    match status {
        AppStatus::Running => status.to_string().green().to_string(),
        AppStatus::Stopping => status.to_string().yellow().to_string(),
        AppStatus::Stopped => status.to_string().dimmed().to_string(),
        AppStatus::Crashed => status.to_string().red().to_string(),
    }
}

fn health_cell(summary: &AppSummary) -> String {
    match summary.health.as_ref().map(|h| h.status) {
        Some(HealthStatus::Healthy) => "healthy".green().to_string(),
        Some(HealthStatus::Unhealthy) => "unhealthy".red().to_string(),
        Some(status) => status.to_string().dimmed().to_string(),
        None => "-".dimmed().to_string(),
    }
}

fn resources_cell(summary: &AppSummary) -> String {
    match summary.resources {
        Some(sample) => format!("{:.1}% / {}MB", sample.cpu_percent, sample.memory_mb),
        None => "-".to_string(),
    }
}

pub fn print_app_table(apps: &[AppSummary]) {
    if apps.is_empty() {
        println!("no apps deployed");
        return;
    }
    println!(
        "{:<20} {:<8} {:<6} {:<10} {:<12} {:<16} {}",
        "NAME".bold(),
        "KIND".bold(),
        "PORT".bold(),
        "STATUS".bold(),
        "HEALTH".bold(),
        "CPU / MEM".bold(),
        "VERSION".bold()
    );
    for app in apps {
        println!(
            "{:<20} {:<8} {:<6} {:<10} {:<12} {:<16} {}",
            app.name,
            app.kind,
            app.port,
            status_cell(app.status),
            health_cell(app),
            resources_cell(app),
            app.current_version
        );
    }
}

pub fn print_app_detail(app: &AppSummary) {
    println!("{}: {}", "name".bold(), app.name);
    println!("{}: {}", "kind".bold(), app.kind);
    println!("{}: {}", "port".bold(), app.port);
    println!("{}: {}", "status".bold(), status_cell(app.status));
    println!("{}: {}", "health".bold(), health_cell(app));
    println!("{}: {}", "resources".bold(), resources_cell(app));
    println!("{}: {}", "version".bold(), app.current_version);
    println!("{}: {}", "versions kept".bold(), app.version_count);
    println!("{}: {}", "autorestart".bold(), app.autorestart);
    println!("{}: {}", "webhook".bold(), if app.webhook_configured { "configured" } else { "not configured" });
    println!("{}: {}", "created".bold(), app.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
}
