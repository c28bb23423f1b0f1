//! Deckhand CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "deckhand=warn",
        1 => "deckhand=info",
        _ => "deckhand=debug,deckhand_ipc=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Deploy(args) => commands::deploy::execute(args).await,
        Commands::List => commands::status::list().await,
        Commands::Show { name } => commands::status::show(name).await,
        Commands::Start { name } => commands::lifecycle::start(name).await,
        Commands::Stop { name } => commands::lifecycle::stop(name).await,
        Commands::Restart { name } => commands::lifecycle::restart(name).await,
        Commands::Delete { name } => commands::lifecycle::delete(name).await,
        Commands::Logs { name, lines } => commands::logs::execute(name, lines).await,
        Commands::Versions { name } => commands::versions::list(name).await,
        Commands::Rollback { name, version } => commands::versions::rollback(name, version).await,
        Commands::Env(args) => commands::env::execute(args.command).await,
        Commands::Webhook(args) => commands::webhook::execute(args.command).await,
        Commands::Health { name } => commands::health::execute(name).await,
        Commands::Ping => commands::status::ping().await,
        Commands::Kill => commands::lifecycle::kill().await,
    }
}
