//! # nexus-watch
//!
//! Command-line consumer of the Nexus realtime task update channel: stores
//! the bearer credential, issues authenticated REST reads, and streams task
//! events as JSON lines.

#![deny(unsafe_code)]

mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nexus_api::ApiClient;
use nexus_auth::{Credential, CredentialStore, FileCredentialStore};
use nexus_core::TaskId;
use nexus_realtime::{RealtimeClient, RealtimeConfig, WsTransport};
use nexus_settings::NexusSettings;
use serde_json::Value;

use crate::watch::{WatchExit, run_watch};

/// Nexus realtime task watcher.
#[derive(Parser, Debug)]
#[command(name = "nexus-watch", version, about = "Watch Nexus task updates in real time")]
struct Cli {
    /// Settings file (defaults to `~/.nexus/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level filter (overrides settings; `RUST_LOG` wins over both).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store the bearer credential.
    Login {
        /// Access token issued by the Nexus backend.
        #[arg(long)]
        token: String,
    },
    /// Remove the stored credential.
    Logout,
    /// GET a REST path and print the JSON response.
    Get {
        /// Path relative to the API base URL, e.g. `/api/tasks/42`.
        path: String,
    },
    /// Stream task events as JSON lines until interrupted.
    Watch {
        /// Task to subscribe to. Repeatable.
        #[arg(long = "task")]
        tasks: Vec<TaskId>,

        /// Print every event, not only those of the subscribed tasks.
        #[arg(long)]
        all: bool,

        /// REST path fetched once after connecting to verify the credential.
        #[arg(long)]
        verify: Option<String>,
    },
}

fn load_settings(cli: &Cli) -> Result<NexusSettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(nexus_settings::settings_path);
    nexus_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))
}

fn credential_store(settings: &NexusSettings) -> Arc<dyn CredentialStore> {
    Arc::new(FileCredentialStore::new(
        nexus_settings::credential_path(settings),
        settings.auth.credential_key.clone(),
    ))
}

fn init_logging(cli: &Cli, settings: &NexusSettings) {
    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    if settings.logging.json {
        nexus_logging::init_json_subscriber(level);
    } else {
        nexus_logging::init_subscriber(level);
    }
}

fn login(credentials: &dyn CredentialStore, token: &str) -> Result<()> {
    let credential = Credential::new(token).context("Token must not be blank")?;
    credentials
        .save(&credential)
        .context("Failed to save credential")?;
    tracing::info!("credential saved");
    Ok(())
}

async fn get(api: &ApiClient, path: &str) -> Result<()> {
    let body: Value = api
        .get_json(path)
        .await
        .with_context(|| format!("GET {path} failed"))?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn watch_tasks(
    settings: &NexusSettings,
    credentials: Arc<dyn CredentialStore>,
    api: ApiClient,
    tasks: &[TaskId],
    all: bool,
    verify: Option<String>,
) -> Result<()> {
    let config =
        RealtimeConfig::from_settings(&settings.realtime).context("Invalid realtime URL")?;
    let client = RealtimeClient::new(config, Arc::new(WsTransport::new()), credentials);

    let unauthorized = api.unauthorized();
    if let Some(path) = verify {
        let _ = tokio::spawn(async move {
            match api.get_json::<Value>(&path).await {
                Ok(_) => tracing::debug!(%path, "credential verified"),
                Err(e) => tracing::warn!(error = %e, %path, "credential check failed"),
            }
        });
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let mut stdout = std::io::stdout().lock();
    match run_watch(&client, tasks, all, unauthorized, shutdown, &mut stdout).await? {
        WatchExit::Interrupted => tracing::info!("interrupted, disconnected"),
        WatchExit::Unauthorized => {
            anyhow::bail!("credential rejected; run `nexus-watch login --token <TOKEN>` again")
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_logging(&cli, &settings);

    let credentials = credential_store(&settings);
    match cli.command {
        Command::Login { token } => login(credentials.as_ref(), &token),
        Command::Logout => credentials.clear().context("Failed to clear credential"),
        Command::Get { path } => {
            let api = ApiClient::from_settings(&settings.api, credentials)
                .context("Failed to build API client")?;
            get(&api, &path).await
        }
        Command::Watch { tasks, all, verify } => {
            let api = ApiClient::from_settings(&settings.api, Arc::clone(&credentials))
                .context("Failed to build API client")?;
            watch_tasks(&settings, credentials, api, &tasks, all, verify).await
        }
    }
}
