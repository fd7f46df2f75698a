//! Token dealer
//!
//! Small CLI around the bearer credential lifecycle:
//! 1. Loads the TOML config and seeds the credential slot if it is empty
//! 2. `header` (default): prints a ready-to-use Authorization header,
//!    refreshing the stored credential first if it has expired
//! 3. `status`: prints the stored credential's validity as JSON, never refreshing

mod config;

use anyhow::{Context, Result};
use bearer_auth::{CredentialLifecycleManager, CredentialStore, now_millis};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Header,
    Status,
}

#[derive(Debug, PartialEq, Eq)]
struct Cli<'a> {
    config_path: Option<&'a str>,
    command: Command,
}

/// Simple `[--config PATH] [header|status]` parsing.
fn parse_args(args: &[String]) -> Result<Cli<'_>> {
    let mut config_path = None;
    let mut command = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config requires a path")?;
                config_path = Some(path.as_str());
            }
            "header" | "status" if command.is_some() => {
                anyhow::bail!("only one command may be given, got extra {arg:?}");
            }
            "header" => command = Some(Command::Header),
            "status" => command = Some(Command::Status),
            other => anyhow::bail!(
                "unknown argument {other:?} (usage: token-dealer [--config PATH] [header|status])"
            ),
        }
    }

    Ok(Cli {
        config_path,
        command: command.unwrap_or(Command::Header),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr; stdout carries only command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let config_path = Config::resolve_path(cli.config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        host = %config.instance.host,
        storage = %config.storage.path.display(),
        subject = %config.seed.subject,
        "configuration loaded"
    );

    let manager = CredentialLifecycleManager::new(
        config.manager_config(),
        CredentialStore::new(),
        reqwest::Client::new(),
    );
    manager
        .bootstrap(&config.seed_record(now_millis()))
        .await
        .context("failed to seed credential store")?;

    let output = run(&manager, cli.command).await?;
    println!("{output}");
    Ok(())
}

/// Execute `command` against the manager and render its output.
async fn run(manager: &CredentialLifecycleManager, command: Command) -> Result<String> {
    match command {
        Command::Header => {
            let value = manager
                .authorization_header()
                .await
                .context("failed to obtain bearer token")?;
            Ok(format!("Authorization: {value}"))
        }
        Command::Status => {
            let status = manager
                .status_at(now_millis())
                .await
                .context("failed to read stored credential")?;
            serde_json::to_string_pretty(&status).context("failed to render status")
        }
    }
}
