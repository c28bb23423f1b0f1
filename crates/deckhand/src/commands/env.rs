//! Env get/set/unset commands

use anyhow::{bail, Result};
use deckhand_ipc::{Request, Response};
use std::collections::HashMap;

use crate::cli::EnvCommand;
use crate::commands::{expect_ok, get_client};
use crate::output::print_success;

pub async fn execute(command: EnvCommand) -> Result<()> {
    match command {
        EnvCommand::Get { name } => get(name).await,
        EnvCommand::Set { name, vars } => set(name, vars).await,
        EnvCommand::Unset { name, keys } => unset(name, keys).await,
    }
}

async fn get(name: String) -> Result<()> {
    let client = get_client();
    let response = client.send(&Request::GetEnv { name }).await?;
    match expect_ok(response)? {
        Response::Env { env } => {
            let mut keys: Vec<&String> = env.keys().collect();
            keys.sort();
            for key in keys {
                println!("{}={}", key, env[key]);
            }
            Ok(())
        }
        _ => bail!("unexpected response from daemon"),
    }
}

async fn set(name: String, vars: Vec<(String, String)>) -> Result<()> {
    let mut env = fetch_env(&name).await?;
    for (key, value) in vars {
        env.insert(key, value);
    }
    push_env(name, env).await
}

async fn unset(name: String, keys: Vec<String>) -> Result<()> {
    let mut env = fetch_env(&name).await?;
    for key in keys {
        env.remove(&key);
    }
    push_env(name, env).await
}

async fn fetch_env(name: &str) -> Result<HashMap<String, String>> {
    let client = get_client();
    let response = client
        .send(&Request::GetEnv {
            name: name.to_string(),
        })
        .await?;
    match expect_ok(response)? {
        Response::Env { env } => Ok(env),
        _ => bail!("unexpected response from daemon"),
    }
}

async fn push_env(name: String, env: HashMap<String, String>) -> Result<()> {
    let client = get_client();
    let response = client.send(&Request::SetEnv { name, env }).await?;
    match expect_ok(response)? {
        Response::Ok { message } => {
            print_success(&message);
            Ok(())
        }
        _ => bail!("unexpected response from daemon"),
    }
}
