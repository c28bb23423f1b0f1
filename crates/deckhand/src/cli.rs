//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deckhand")]
#[command(version, about = "Self-hosted mini-PaaS: deploy and supervise apps")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy a new app from an archive or a git repository
    Deploy(DeployArgs),

    /// List all apps
    #[command(alias = "ls")]
    List,

    /// Show one app in detail
    Show {
        /// App name
        name: String,
    },

    /// Start a stopped app
    Start { name: String },

    /// Stop a running app
    Stop { name: String },

    /// Restart an app
    Restart { name: String },

    /// Stop an app and remove it entirely
    Delete { name: String },

    /// Show recent log lines
    Logs {
        name: String,
        /// How many lines from the end of the log
        #[arg(short = 'n', long, default_value = "100")]
        lines: usize,
    },

    /// List an app's versions
    Versions { name: String },

    /// Roll an app back to a previous version
    Rollback { name: String, version: String },

    /// Read or change an app's environment
    Env(EnvArgs),

    /// Configure webhook-triggered redeploys
    Webhook(WebhookArgs),

    /// Probe one app, or report platform health with no name
    Health {
        name: Option<String>,
    },

    /// Check whether the daemon is alive
    Ping,

    /// Stop all apps and shut the daemon down
    Kill,
}

#[derive(Args)]
pub struct DeployArgs {
    /// App name (normalized to lowercase and hyphens)
    pub name: String,

    /// Path to a gzipped tarball of the app
    #[arg(long, conflicts_with = "git")]
    pub archive: Option<PathBuf>,

    /// Git URL to clone instead of an archive
    #[arg(long)]
    pub git: Option<String>,

    /// Branch to clone (with --git)
    #[arg(long, requires = "git")]
    pub branch: Option<String>,
}

#[derive(Args)]
pub struct EnvArgs {
    #[command(subcommand)]
    pub command: EnvCommand,
}

#[derive(Subcommand)]
pub enum EnvCommand {
    /// Print the app's configured environment
    Get { name: String },

    /// Set KEY=VALUE pairs (restart to apply)
    Set {
        name: String,
        /// Variables as KEY=VALUE
        #[arg(required = true, value_parser = parse_key_val)]
        vars: Vec<(String, String)>,
    },

    /// Remove keys from the app's environment
    Unset {
        name: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

#[derive(Args)]
pub struct WebhookArgs {
    #[command(subcommand)]
    pub command: WebhookCommand,
}

#[derive(Subcommand)]
pub enum WebhookCommand {
    /// Set the HMAC secret used to verify webhook deliveries
    SetSecret { name: String, secret: String },

    /// Clear the webhook secret, disabling webhook redeploys
    Clear { name: String },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
