//! Audit Vault backend binary - composition root.
//!
//! Ties together the vault crates into a single executable:
//! 1. Load configuration from TOML, overlaid by CLI args and env vars
//! 2. Open SQLite storage and run migrations
//! 3. Bootstrap the operator account and bearer token on first run
//! 4. Build the chat service around the completion provider client
//! 5. Start the axum REST API server (localhost only)

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use vault_api::routes;
use vault_api::state::AppState;
use vault_chat::{ChatService, HttpCompletionClient};
use vault_core::config::VaultConfig;
use vault_storage::{Database, UserRepository};

use cli::CliArgs;

/// Expand ~ to home directory in a path string.
fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Tracing. RUST_LOG wins; otherwise the --log-level flag, then "info".
    let default_filter = args
        .resolve_log_level()
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    tracing::info!("Starting Audit Vault backend v{}", env!("CARGO_PKG_VERSION"));

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = VaultConfig::load_or_default(&config_file);
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Overlays. The credential is read from the environment exactly once,
    // here; everything downstream sees the immutable snapshot.
    config.server.port = args.resolve_port(config.server.port);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Ok(key) = std::env::var("AUDITVAULT_API_KEY") {
        if !key.trim().is_empty() {
            config.assistant.api_key = key.trim().to_string();
        }
    }

    // Storage.
    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("vault.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // First-run bootstrap: mint the operator account and its bearer token.
    // The token lands in a file, never in the logs.
    let users = UserRepository::new(Arc::clone(&db));
    if users.count()? == 0 {
        let token_path = data_dir.join("api_token");
        let token = vault_api::auth::load_or_generate_token(&token_path);
        users.create("admin", &token)?;
        tracing::info!(path = %token_path.display(), "Operator account created; token written");
    }

    // Chat service around the completion provider.
    if config.assistant.api_key.is_empty() {
        tracing::warn!("No assistant credential configured; chat requests will be refused");
    } else {
        tracing::info!(model = %config.assistant.model, "Assistant provider configured");
    }
    let client = Arc::new(HttpCompletionClient::new(&config.assistant)?);
    let chat = Arc::new(ChatService::new(Arc::clone(&db), client));

    // === API server ===

    let port = config.server.port;
    let state = AppState::new(config, db, chat);

    if let Err(e) = routes::start_server(state).await {
        tracing::error!(error = %e, "Failed to start API server — is another instance running?");
        tracing::error!("Try: auditvault --port {}", port + 1);
        return Err(e.into());
    }

    Ok(())
}
