//! Repository implementations for SQLite-backed persistence.
//!
//! Provides SessionRepository, MessageRepository, DocumentRepository, and
//! UserRepository that operate on the Database struct using raw SQL.
//!
//! Ownership is enforced in the SQL itself: every session read or delete is
//! scoped to the calling user, and a miss is indistinguishable from a
//! session that never existed.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vault_core::error::VaultError;
use vault_core::types::{ChatMessage, ChatSession, DocumentContext, MessageRole, User};

use crate::db::Database;

/// A session row joined with its message count, for the session list view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
    pub message_count: i64,
}

// ============================================================================
// SessionRepository
// ============================================================================

/// Repository for chat sessions.
pub struct SessionRepository {
    db: Arc<Database>,
}

impl SessionRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a new session for a user.
    pub fn create(&self, user_id: Uuid, title: &str) -> Result<ChatSession, VaultError> {
        let session = ChatSession {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_sessions (id, user_id, title, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    session.id.to_string(),
                    session.user_id.to_string(),
                    session.title,
                    session.created_at.timestamp_millis(),
                    session.updated_at.timestamp_millis(),
                ],
            )
            .map_err(|e| VaultError::Storage(format!("Failed to create session: {}", e)))?;
            Ok(())
        })?;

        Ok(session)
    }

    /// Find a session by ID, scoped to its owner.
    ///
    /// Returns `None` both when the session does not exist and when it
    /// belongs to a different user. Callers cannot tell the two apart.
    pub fn find_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ChatSession>, VaultError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, title, created_at, updated_at
                     FROM chat_sessions WHERE id = ?1 AND user_id = ?2",
                )
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(
                    rusqlite::params![id.to_string(), user_id.to_string()],
                    |row| Ok(row_to_session(row)),
                )
                .optional()
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            match result {
                Some(session) => Ok(Some(session?)),
                None => Ok(None),
            }
        })
    }

    /// List all sessions for a user, newest first, with message counts.
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SessionSummary>, VaultError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT s.id, s.title, s.created_at, s.updated_at, COUNT(m.id)
                     FROM chat_sessions s
                     LEFT JOIN chat_messages m ON m.session_id = s.id
                     WHERE s.user_id = ?1
                     GROUP BY s.id
                     ORDER BY s.updated_at DESC, s.rowid DESC",
                )
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string()], |row| {
                    Ok(row_to_summary(row))
                })
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            let mut summaries = Vec::new();
            for row in rows {
                let summary = row.map_err(|e| VaultError::Storage(e.to_string()))??;
                summaries.push(summary);
            }
            Ok(summaries)
        })
    }

    /// Delete a session (and, via cascade, its messages) if the user owns it.
    ///
    /// Returns whether a row was removed. A missing or foreign session is a
    /// silent no-op.
    pub fn delete_for_user(&self, id: Uuid, user_id: Uuid) -> Result<bool, VaultError> {
        self.db.with_conn(|conn| {
            let affected = conn
                .execute(
                    "DELETE FROM chat_sessions WHERE id = ?1 AND user_id = ?2",
                    rusqlite::params![id.to_string(), user_id.to_string()],
                )
                .map_err(|e| VaultError::Storage(format!("Failed to delete session: {}", e)))?;
            Ok(affected > 0)
        })
    }

    /// Bump a session's updated_at to now. Called whenever a message lands.
    pub fn touch(&self, id: Uuid) -> Result<(), VaultError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE chat_sessions SET updated_at = ?1 WHERE id = ?2",
                rusqlite::params![Utc::now().timestamp_millis(), id.to_string()],
            )
            .map_err(|e| VaultError::Storage(format!("Failed to touch session: {}", e)))?;
            Ok(())
        })
    }
}

// ============================================================================
// MessageRepository
// ============================================================================

/// Repository for chat messages.
pub struct MessageRepository {
    db: Arc<Database>,
}

impl MessageRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a message to a session.
    pub fn append(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<ChatMessage, VaultError> {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    message.id.to_string(),
                    message.session_id.to_string(),
                    message.role.as_str(),
                    message.content,
                    message.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| VaultError::Storage(format!("Failed to append message: {}", e)))?;
            Ok(())
        })?;

        Ok(message)
    }

    /// The most recent `limit` messages of a session, in ascending
    /// chronological order.
    ///
    /// This is the fixed-count history window handed to the provider; the
    /// rowid tiebreak keeps insertion order stable for same-millisecond rows.
    pub fn recent(&self, session_id: Uuid, limit: u64) -> Result<Vec<ChatMessage>, VaultError> {
        let mut messages = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, role, content, created_at
                     FROM chat_messages
                     WHERE session_id = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?2",
                )
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id.to_string(), limit], |row| {
                    Ok(row_to_message(row))
                })
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let message = row.map_err(|e| VaultError::Storage(e.to_string()))??;
                messages.push(message);
            }
            Ok(messages)
        })?;

        messages.reverse();
        Ok(messages)
    }

    /// All messages of a session in ascending chronological order.
    pub fn list_for_session(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, VaultError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, role, content, created_at
                     FROM chat_messages
                     WHERE session_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                )
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id.to_string()], |row| {
                    Ok(row_to_message(row))
                })
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let message = row.map_err(|e| VaultError::Storage(e.to_string()))??;
                messages.push(message);
            }
            Ok(messages)
        })
    }

    /// Count messages in a session.
    pub fn count_for_session(&self, session_id: Uuid) -> Result<u64, VaultError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM chat_messages WHERE session_id = ?1",
                    rusqlite::params![session_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| VaultError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

// ============================================================================
// DocumentRepository
// ============================================================================

/// Read-only repository over the documents and funds reference tables.
pub struct DocumentRepository {
    db: Arc<Database>,
}

impl DocumentRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Fetch documents by ID, with their fund reference flattened in.
    ///
    /// IDs that match no row are silently dropped; existence is not
    /// enforced. An empty input yields an empty result without touching
    /// the database.
    pub fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<DocumentContext>, VaultError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT d.id, d.title, f.name, f.code, d.doc_type, d.status,
                    d.period_start, d.period_end, d.description
             FROM documents d
             JOIN funds f ON f.id = d.fund_id
             WHERE d.id IN ({})
             ORDER BY d.title ASC",
            placeholders
        );

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params_from_iter(ids.iter().map(|id| id.to_string())),
                    |row| Ok(row_to_document(row)),
                )
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            let mut documents = Vec::new();
            for row in rows {
                let document = row.map_err(|e| VaultError::Storage(e.to_string()))??;
                documents.push(document);
            }
            Ok(documents)
        })
    }

    /// List every document, for the context picker.
    pub fn list_all(&self) -> Result<Vec<DocumentContext>, VaultError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT d.id, d.title, f.name, f.code, d.doc_type, d.status,
                            d.period_start, d.period_end, d.description
                     FROM documents d
                     JOIN funds f ON f.id = d.fund_id
                     ORDER BY d.title ASC",
                )
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| Ok(row_to_document(row)))
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            let mut documents = Vec::new();
            for row in rows {
                let document = row.map_err(|e| VaultError::Storage(e.to_string()))??;
                documents.push(document);
            }
            Ok(documents)
        })
    }
}

// ============================================================================
// UserRepository
// ============================================================================

/// Repository for the identity read-model behind the auth guard.
pub struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Resolve a bearer token to its user.
    pub fn find_by_token(&self, token: &str) -> Result<Option<User>, VaultError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name FROM users WHERE api_token = ?1")
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![token], |row| Ok(row_to_user(row)))
                .optional()
                .map_err(|e| VaultError::Storage(e.to_string()))?;

            match result {
                Some(user) => Ok(Some(user?)),
                None => Ok(None),
            }
        })
    }

    /// Create a user with the given token.
    pub fn create(&self, name: &str, token: &str) -> Result<User, VaultError> {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, api_token, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    user.id.to_string(),
                    user.name,
                    token,
                    Utc::now().timestamp_millis(),
                ],
            )
            .map_err(|e| VaultError::Storage(format!("Failed to create user: {}", e)))?;
            Ok(())
        })?;

        Ok(user)
    }

    /// Count registered users.
    pub fn count(&self) -> Result<u64, VaultError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
                .map_err(|e| VaultError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

// ============================================================================
// Helper functions for row-to-entity conversion.
// ============================================================================

fn parse_uuid(value: &str) -> Result<Uuid, VaultError> {
    Uuid::parse_str(value).map_err(|e| VaultError::Storage(format!("Invalid UUID: {}", e)))
}

fn millis_to_datetime(millis: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<ChatSession, VaultError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let user_id_str: String = row
        .get(1)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let title: String = row
        .get(2)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let created_at: i64 = row
        .get(3)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let updated_at: i64 = row
        .get(4)
        .map_err(|e| VaultError::Storage(e.to_string()))?;

    Ok(ChatSession {
        id: parse_uuid(&id_str)?,
        user_id: parse_uuid(&user_id_str)?,
        title,
        created_at: millis_to_datetime(created_at),
        updated_at: millis_to_datetime(updated_at),
    })
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> Result<SessionSummary, VaultError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let title: String = row
        .get(1)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let created_at: i64 = row
        .get(2)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let updated_at: i64 = row
        .get(3)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let message_count: i64 = row
        .get(4)
        .map_err(|e| VaultError::Storage(e.to_string()))?;

    Ok(SessionSummary {
        id: parse_uuid(&id_str)?,
        title,
        created_at: millis_to_datetime(created_at),
        updated_at: millis_to_datetime(updated_at),
        message_count,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<ChatMessage, VaultError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let session_id_str: String = row
        .get(1)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let role_str: String = row
        .get(2)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let content: String = row
        .get(3)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let created_at: i64 = row
        .get(4)
        .map_err(|e| VaultError::Storage(e.to_string()))?;

    // The CHECK constraint admits only these two values.
    let role = match role_str.as_str() {
        "assistant" => MessageRole::Assistant,
        _ => MessageRole::User,
    };

    Ok(ChatMessage {
        id: parse_uuid(&id_str)?,
        session_id: parse_uuid(&session_id_str)?,
        role,
        content,
        created_at: millis_to_datetime(created_at),
    })
}

fn row_to_document(row: &rusqlite::Row<'_>) -> Result<DocumentContext, VaultError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let title: String = row
        .get(1)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let fund_name: String = row
        .get(2)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let fund_code: String = row
        .get(3)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let doc_type: String = row
        .get(4)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let status: String = row
        .get(5)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let period_start: i64 = row
        .get(6)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let period_end: i64 = row
        .get(7)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let description: Option<String> = row
        .get(8)
        .map_err(|e| VaultError::Storage(e.to_string()))?;

    Ok(DocumentContext {
        id: parse_uuid(&id_str)?,
        title,
        fund_name,
        fund_code,
        doc_type,
        status,
        period_start: millis_to_datetime(period_start),
        period_end: millis_to_datetime(period_end),
        description,
    })
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User, VaultError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| VaultError::Storage(e.to_string()))?;
    let name: String = row
        .get(1)
        .map_err(|e| VaultError::Storage(e.to_string()))?;

    Ok(User {
        id: parse_uuid(&id_str)?,
        name,
    })
}

/// Extension trait for rusqlite to support optional query results.
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
