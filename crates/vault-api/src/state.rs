//! Application state shared across all route handlers.
//!
//! AppState holds the configuration snapshot, the database handle, and the
//! chat service. It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use vault_chat::ChatService;
use vault_core::VaultConfig;
use vault_storage::Database;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. The
/// configuration is an immutable snapshot taken at startup; nothing mutates
/// it afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration snapshot.
    pub config: Arc<VaultConfig>,
    /// SQLite database for persistent storage.
    pub database: Arc<Database>,
    /// The chat send pipeline.
    pub chat: Arc<ChatService>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState with the given components.
    pub fn new(config: VaultConfig, database: Arc<Database>, chat: Arc<ChatService>) -> Self {
        Self {
            config: Arc::new(config),
            database,
            chat,
            start_time: Instant::now(),
        }
    }
}
