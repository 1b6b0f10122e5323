use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Who authored a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The authenticated end user.
    User,
    /// The assistant reply generated by the provider.
    Assistant,
}

impl MessageRole {
    /// Returns the TEXT column value for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

// =============================================================================
// Entity structs (defined in vault-core for shared use)
// =============================================================================

/// A persisted, user-owned conversation thread.
///
/// Created lazily on the first message of a conversation; deleted explicitly
/// by the owner, cascading to its messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Derived from the first message (80 chars max), default "New Chat".
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One turn in a session. Append-only; never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Read-only document projection consumed by the chat context assembler.
///
/// Documents are owned by the wider Audit Vault system; this backend only
/// reads them (with their fund reference flattened in) to render context
/// blocks and the document picker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContext {
    pub id: Uuid,
    pub title: String,
    pub fund_name: String,
    pub fund_code: String,
    pub doc_type: String,
    pub status: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub description: Option<String>,
}

/// The authenticated caller, resolved by the auth guard from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

// =============================================================================
// Tests
// =============================================================================
