//! The chat send flow.
//!
//! One call handles a user turn end to end: resolve the session, persist the
//! user message, assemble the prompt, call the provider, sanitize the reply,
//! persist it. Sequential with no intra-request parallelism; every failure is
//! terminal for that request.

use std::sync::Arc;

use tracing::error;
use uuid::Uuid;

use vault_core::types::{ChatMessage, ChatSession, MessageRole, User};
use vault_storage::{Database, DocumentRepository, MessageRepository, SessionRepository};

use crate::context;
use crate::error::ChatError;
use crate::provider::CompletionClient;
use crate::sanitize::sanitize;

/// Fixed-count history window handed to the provider. The window bounds
/// prompt size; there is no token counting or summarization.
pub const HISTORY_WINDOW: u64 = 20;

/// Maximum accepted user message length, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

const TITLE_MAX_CHARS: usize = 80;

/// Input to [`ChatService::send`].
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub message: String,
    pub session_id: Option<Uuid>,
    pub document_ids: Vec<Uuid>,
}

/// The persisted exchange a successful send produces.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub session: ChatSession,
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
}

/// Orchestrates chat sends against the repositories and the provider.
pub struct ChatService {
    sessions: SessionRepository,
    messages: MessageRepository,
    documents: DocumentRepository,
    client: Arc<dyn CompletionClient>,
}

impl ChatService {
    pub fn new(db: Arc<Database>, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            sessions: SessionRepository::new(Arc::clone(&db)),
            messages: MessageRepository::new(Arc::clone(&db)),
            documents: DocumentRepository::new(db),
            client,
        }
    }

    /// Handle one user message.
    pub async fn send(&self, user: &User, request: SendRequest) -> Result<SendOutcome, ChatError> {
        // A misconfigured deployment fails before any row is written or any
        // request leaves the host.
        if !self.client.is_configured() {
            return Err(ChatError::MissingCredential);
        }

        if request.message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
        }

        let session = self.resolve_session(user, &request)?;

        // The user turn is persisted before calling out, so it survives a
        // provider failure.
        let user_message = self
            .messages
            .append(session.id, MessageRole::User, &request.message)?;

        let documents = self.documents.find_by_ids(&request.document_ids)?;
        let history = self.messages.recent(session.id, HISTORY_WINDOW)?;
        let prompt = context::assemble_messages(&documents, &history);

        let raw_reply = match self.client.complete(prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(session_id = %session.id, error = %e, "Assistant provider call failed");
                return Err(e);
            }
        };

        let reply = sanitize(&raw_reply);
        let assistant_message = self
            .messages
            .append(session.id, MessageRole::Assistant, &reply)?;
        self.sessions.touch(session.id)?;

        Ok(SendOutcome {
            session,
            user_message,
            assistant_message,
        })
    }

    /// Resolve the target session.
    ///
    /// A supplied id is honored only when the caller owns it. A missing or
    /// foreign id silently falls back to a fresh session; it never raises an
    /// authorization error and never writes into the foreign session.
    fn resolve_session(
        &self,
        user: &User,
        request: &SendRequest,
    ) -> Result<ChatSession, ChatError> {
        if let Some(id) = request.session_id {
            if let Some(existing) = self.sessions.find_for_user(id, user.id)? {
                return Ok(existing);
            }
        }

        let title = derive_title(&request.message);
        Ok(self.sessions.create(user.id, &title)?)
    }
}

/// Session title from the first message: the leading characters of the
/// trimmed text, or "New Chat" when nothing is left after trimming.
fn derive_title(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return "New Chat".to_string();
    }
    trimmed.chars().take(TITLE_MAX_CHARS).collect()
}
