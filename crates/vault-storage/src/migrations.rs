//! Database schema migrations.
//!
//! Applies the initial schema: users, funds, documents, chat_sessions,
//! chat_messages, and the schema_migrations tracking table.

use rusqlite::Connection;
use tracing::info;

use vault_core::error::VaultError;

/// Run all pending database migrations.
///
/// Currently implements the initial schema (version 1). Future migrations
/// can be added by checking the current version and applying incremental changes.
pub fn run_migrations(conn: &Connection) -> Result<(), VaultError> {
    // Create the migrations tracking table first.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| VaultError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| VaultError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
///
/// Timestamps are epoch milliseconds so message ordering survives
/// sub-second inserts (a user turn and its assistant reply often land
/// within the same second).
fn apply_v1(conn: &Connection) -> Result<(), VaultError> {
    conn.execute_batch(
        "
        -- Identity read-model behind the bearer-token guard.
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            api_token   TEXT NOT NULL UNIQUE,
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_users_api_token
            ON users (api_token);

        -- Reference data owned by the wider Audit Vault system.
        CREATE TABLE IF NOT EXISTS funds (
            id    TEXT PRIMARY KEY NOT NULL,
            name  TEXT NOT NULL,
            code  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
            id            TEXT PRIMARY KEY NOT NULL,
            fund_id       TEXT NOT NULL,
            title         TEXT NOT NULL,
            doc_type      TEXT NOT NULL,
            status        TEXT NOT NULL,
            period_start  INTEGER NOT NULL,
            period_end    INTEGER NOT NULL,
            description   TEXT,
            FOREIGN KEY (fund_id) REFERENCES funds(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_documents_fund
            ON documents (fund_id);

        -- Conversation threads, owned per user.
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id          TEXT PRIMARY KEY NOT NULL,
            user_id     TEXT NOT NULL,
            title       TEXT NOT NULL DEFAULT 'New Chat',
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chat_sessions_user
            ON chat_sessions (user_id, updated_at DESC);

        -- Append-only message log; deleting a session removes its messages.
        CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY NOT NULL,
            session_id  TEXT NOT NULL,
            role        TEXT NOT NULL
                        CHECK (role IN ('user', 'assistant')),
            content     TEXT NOT NULL DEFAULT '',
            created_at  INTEGER NOT NULL,
            FOREIGN KEY (session_id) REFERENCES chat_sessions(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_session
            ON chat_messages (session_id, created_at ASC);

        -- Record migration.
        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| VaultError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
