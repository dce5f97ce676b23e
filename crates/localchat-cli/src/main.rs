//! Terminal front end for a local chat-completions server.
//!
//! ```bash
//! # Chat with the endpoint from the settings file
//! localchat
//!
//! # Use another endpoint for this session only
//! localchat --endpoint http://192.168.1.20:1234/v1/chat/completions
//!
//! # Inspect or change saved settings
//! localchat config show
//! localchat config set-endpoint http://localhost:8080/v1/chat/completions
//! ```

mod commands;
mod repl;
mod terminal_renderer;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use localchat_core::HttpInferenceClient;
use localchat_core::models::ErrorStore;
use localchat_core::services::ErrorCollectorLayer;
use localchat_core::settings::{SettingsJsonRepository, SettingsRepository};
use tracing::{Level, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use repl::Repl;

/// Warnings and errors kept for `/errors`
const MAX_ERROR_ENTRIES: usize = 200;

#[derive(Parser)]
#[command(
    name = "localchat",
    about = "Chat with a model served by a local inference server"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Chat-completions URL for this run, overriding the settings file
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show or change saved settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the settings file location and its values
    Show,
    /// Save the endpoint used by future sessions
    SetEndpoint {
        /// Full chat-completions URL
        url: String,
    },
}

fn init_logging(verbose: bool, error_layer: ErrorCollectorLayer) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(error_layer)
        .init();
}

async fn run_config(repository: &SettingsJsonRepository, action: ConfigCommand) -> Result<()> {
    let path = repository.storage_path();
    let mut settings = repository
        .load()
        .await
        .with_context(|| format!("failed to load settings from {path}"))?;

    match action {
        ConfigCommand::Show => {
            println!("Settings file: {path}");
            let json =
                serde_json::to_string_pretty(&settings).context("failed to serialize settings")?;
            println!("{json}");
        }
        ConfigCommand::SetEndpoint { url } => {
            settings.endpoint = url;
            repository
                .save(settings)
                .await
                .with_context(|| format!("failed to save settings to {path}"))?;
            info!(path = %path, "Endpoint saved");
            println!("Saved endpoint to {path}");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (error_layer, error_rx) = ErrorCollectorLayer::new();
    init_logging(cli.verbose, error_layer);

    let repository = SettingsJsonRepository::new().context("failed to locate settings file")?;

    if let Some(Command::Config { action }) = cli.command {
        return run_config(&repository, action).await;
    }

    let mut settings = repository
        .load()
        .await
        .with_context(|| format!("failed to load settings from {}", repository.storage_path()))?;
    if let Some(endpoint) = cli.endpoint {
        settings.endpoint = endpoint;
    }

    let client =
        HttpInferenceClient::from_settings(&settings).context("failed to create HTTP client")?;
    info!(endpoint = %client.endpoint(), "Starting localchat");

    Repl::new(client, ErrorStore::new(MAX_ERROR_ENTRIES), error_rx)
        .run()
        .await
}
