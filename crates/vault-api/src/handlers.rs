//! Route handler functions for all API endpoints.
//!
//! Each handler extracts parameters via axum extractors, scopes its queries
//! to the authenticated user from the request extensions, and returns JSON.

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vault_chat::SendRequest;
use vault_core::types::{ChatMessage, DocumentContext, User};
use vault_storage::{DocumentRepository, MessageRepository, SessionRepository, SessionSummary, UserRepository};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

/// Body of POST /chat/send.
///
/// Ids arrive as strings and are parsed leniently: a malformed session id is
/// treated like an unknown one (a fresh session is started), and malformed
/// document ids are dropped alongside ids that match no row.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBody {
    pub message: String,
    pub session_id: Option<String>,
    #[serde(default)]
    pub document_ids: Vec<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetailResponse {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub session_id: Uuid,
    pub session_title: String,
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentsResponse {
    pub documents: Vec<DocumentContext>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub registered_users: u64,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let uptime = state.start_time.elapsed().as_secs();
    let registered_users = UserRepository::new(Arc::clone(&state.database))
        .count()
        .unwrap_or(0);

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: "0.1.0".to_string(),
        uptime_secs: uptime,
        registered_users,
    }))
}

/// GET /chat/sessions - list the caller's sessions, newest first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let sessions = SessionRepository::new(Arc::clone(&state.database))
        .list_for_user(user.id)
        .map_err(ApiError::from)?;

    Ok(Json(SessionsResponse { sessions }))
}

/// GET /chat/sessions/{id} - one session with its ordered messages.
///
/// Unknown, foreign, and malformed ids all yield `null`; callers cannot tell
/// "doesn't exist" from "not yours".
pub async fn get_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Option<SessionDetailResponse>>, ApiError> {
    let session_id = match Uuid::parse_str(&id) {
        Ok(v) => v,
        Err(_) => return Ok(Json(None)),
    };

    let session = SessionRepository::new(Arc::clone(&state.database))
        .find_for_user(session_id, user.id)
        .map_err(ApiError::from)?;

    let Some(session) = session else {
        return Ok(Json(None));
    };

    let messages = MessageRepository::new(Arc::clone(&state.database))
        .list_for_session(session.id)
        .map_err(ApiError::from)?;

    Ok(Json(Some(SessionDetailResponse {
        id: session.id,
        title: session.title,
        created_at: session.created_at,
        updated_at: session.updated_at,
        messages,
    })))
}

/// DELETE /chat/sessions/{id} - delete an owned session and its messages.
///
/// Always 204: deleting an unknown, foreign, or malformed id is a no-op.
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session_id = match Uuid::parse_str(&id) {
        Ok(v) => v,
        Err(_) => return Ok(StatusCode::NO_CONTENT),
    };

    let deleted = SessionRepository::new(Arc::clone(&state.database))
        .delete_for_user(session_id, user.id)
        .map_err(ApiError::from)?;

    if deleted {
        tracing::info!(session_id = %session_id, "Chat session deleted");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /chat/send - send a message and get the assistant's reply.
pub async fn send(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(body): Json<SendBody>,
) -> Result<Json<SendResponse>, ApiError> {
    let session_id = body
        .session_id
        .as_deref()
        .and_then(|s| Uuid::parse_str(s).ok());
    let document_ids = body
        .document_ids
        .iter()
        .filter_map(|s| Uuid::parse_str(s).ok())
        .collect();

    let outcome = state
        .chat
        .send(
            &user,
            SendRequest {
                message: body.message,
                session_id,
                document_ids,
            },
        )
        .await?;

    Ok(Json(SendResponse {
        session_id: outcome.session.id,
        session_title: outcome.session.title,
        user_message: outcome.user_message,
        assistant_message: outcome.assistant_message,
    }))
}

/// GET /documents - every document available for context selection.
pub async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, ApiError> {
    let documents = DocumentRepository::new(Arc::clone(&state.database))
        .list_all()
        .map_err(ApiError::from)?;

    Ok(Json(DocumentsResponse { documents }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use vault_chat::{ChatError, ChatService, CompletionClient, ProviderMessage};
    use vault_core::error::VaultError;
    use vault_core::VaultConfig;
    use vault_storage::Database;

    const TEST_TOKEN: &str = "test-token-12345";

    struct ScriptedClient {
        configured: bool,
        reply: Result<String, String>,
        calls: AtomicUsize,
        seen: Mutex<Vec<ProviderMessage>>,
    }

    impl ScriptedClient {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                configured: true,
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                configured: true,
                reply: Err(message.to_string()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn unconfigured() -> Arc<Self> {
            Arc::new(Self {
                configured: false,
                reply: Ok("unused".to_string()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for ScriptedClient {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(&self, messages: Vec<ProviderMessage>) -> Result<String, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().unwrap() = messages;
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(ChatError::Provider(message.clone())),
            }
        }
    }

    fn make_state_with(client: Arc<ScriptedClient>) -> AppState {
        let db = Arc::new(Database::in_memory().unwrap());
        UserRepository::new(Arc::clone(&db))
            .create("tester", TEST_TOKEN)
            .unwrap();
        let chat = Arc::new(ChatService::new(Arc::clone(&db), client));
        AppState::new(VaultConfig::default(), db, chat)
    }

    fn make_state() -> AppState {
        make_state_with(ScriptedClient::replying("Understood."))
    }

    fn make_app() -> axum::Router {
        crate::create_router(make_state())
    }

    fn add_user(state: &AppState, name: &str, token: &str) -> User {
        UserRepository::new(Arc::clone(&state.database))
            .create(name, token)
            .unwrap()
    }

    fn seed_document(state: &AppState, title: &str) -> Uuid {
        let doc_id = Uuid::new_v4();
        state
            .database
            .with_conn(|conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO funds (id, name, code)
                     VALUES ('f1', 'Meridian Growth Fund', 'MGF-II')",
                    [],
                )
                .map_err(|e| VaultError::Storage(e.to_string()))?;
                conn.execute(
                    "INSERT INTO documents
                     (id, fund_id, title, doc_type, status, period_start, period_end, description)
                     VALUES (?1, 'f1', ?2, 'financial_statement', 'approved',
                             1719792000000, 1727740800000, 'Quarterly statements')",
                    rusqlite::params![doc_id.to_string(), title],
                )
                .map_err(|e| VaultError::Storage(e.to_string()))?;
                Ok(())
            })
            .unwrap();
        doc_id
    }

    fn authed_get(uri: &str) -> Request<Body> {
        Request::get(uri)
            .header("authorization", format!("Bearer {}", TEST_TOKEN))
            .body(Body::empty())
            .unwrap()
    }

    fn authed_delete(uri: &str) -> Request<Body> {
        Request::delete(uri)
            .header("authorization", format!("Bearer {}", TEST_TOKEN))
            .body(Body::empty())
            .unwrap()
    }

    fn send_json(json: &str) -> Request<Body> {
        Request::post("/chat/send")
            .header("authorization", format!("Bearer {}", TEST_TOKEN))
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap()
            .to_vec()
    }

    // ---- Health ----

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = make_app();
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = body_bytes(resp).await;
        let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.registered_users, 1);
    }

    // ---- Auth guard ----

    #[tokio::test]
    async fn test_sessions_require_auth() {
        let app = make_app();
        let resp = app
            .oneshot(Request::get("/chat/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sessions_reject_unknown_token() {
        let app = make_app();
        let resp = app
            .oneshot(
                Request::get("/chat/sessions")
                    .header("authorization", "Bearer wrong-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    // ---- Session list ----

    #[tokio::test]
    async fn test_list_sessions_empty() {
        let app = make_app();
        let resp = app.oneshot(authed_get("/chat/sessions")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = body_bytes(resp).await;
        let list: SessionsResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(list.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_list_sessions_counts_messages() {
        let state = make_state();
        let app = crate::create_router(state);

        let resp = app
            .clone()
            .oneshot(send_json(r#"{"message": "What changed in Q3?"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(authed_get("/chat/sessions")).await.unwrap();
        let bytes = body_bytes(resp).await;
        let list: SessionsResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(list.sessions.len(), 1);
        assert_eq!(list.sessions[0].title, "What changed in Q3?");
        assert_eq!(list.sessions[0].message_count, 2);
    }

    // ---- Send ----

    #[tokio::test]
    async fn test_send_creates_session_and_returns_exchange() {
        let app = make_app();
        let resp = app
            .oneshot(send_json(r#"{"message": "Summarize the quarter"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = body_bytes(resp).await;
        let sent: SendResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(sent.session_title, "Summarize the quarter");
        assert_eq!(sent.user_message.content, "Summarize the quarter");
        assert_eq!(sent.assistant_message.content, "Understood.");
        assert_eq!(sent.user_message.session_id, sent.session_id);
    }

    #[tokio::test]
    async fn test_send_response_uses_camel_case() {
        let app = make_app();
        let resp = app
            .oneshot(send_json(r#"{"message": "hi"}"#))
            .await
            .unwrap();

        let bytes = body_bytes(resp).await;
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value.get("sessionId").is_some());
        assert!(value.get("sessionTitle").is_some());
        assert!(value["userMessage"].get("createdAt").is_some());
        assert!(value["assistantMessage"].get("sessionId").is_some());
    }

    #[tokio::test]
    async fn test_send_resumes_session_by_id() {
        let app = make_app();

        let resp = app
            .clone()
            .oneshot(send_json(r#"{"message": "first"}"#))
            .await
            .unwrap();
        let first: SendResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();

        let resp = app
            .oneshot(send_json(&format!(
                r#"{{"message": "second", "sessionId": "{}"}}"#,
                first.session_id
            )))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let second: SendResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.session_title, "first");
    }

    #[tokio::test]
    async fn test_send_malformed_session_id_starts_new_session() {
        let app = make_app();
        let resp = app
            .oneshot(send_json(
                r#"{"message": "hello", "sessionId": "not-a-uuid"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let sent: SendResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(sent.session_title, "hello");
    }

    #[tokio::test]
    async fn test_send_missing_credential_is_unauthorized_without_call() {
        let client = ScriptedClient::unconfigured();
        let state = make_state_with(Arc::clone(&client));
        let app = crate::create_router(state);

        let resp = app
            .oneshot(send_json(r#"{"message": "hello"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);

        let bytes = body_bytes(resp).await;
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_send_provider_failure_returns_generic_503() {
        let client = ScriptedClient::failing("connect timeout after 30s to 10.0.0.8");
        let state = make_state_with(client);
        let app = crate::create_router(state);

        let resp = app
            .oneshot(send_json(r#"{"message": "hello"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = body_bytes(resp).await;
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value["message"],
            "The assistant is unavailable right now. Please try again later."
        );
        // Upstream detail must not leak.
        assert!(!value.to_string().contains("10.0.0.8"));
    }

    #[tokio::test]
    async fn test_send_too_long_message_is_bad_request() {
        let app = make_app();
        let message = "y".repeat(vault_chat::MAX_MESSAGE_LENGTH + 1);
        let resp = app
            .oneshot(send_json(&format!(r#"{{"message": "{}"}}"#, message)))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_send_with_document_ids_builds_context() {
        let client = ScriptedClient::replying("Summary of the statements.");
        let state = make_state_with(Arc::clone(&client));
        let doc_id = seed_document(&state, "Q3 Financial Statements");
        let app = crate::create_router(state);

        let resp = app
            .oneshot(send_json(&format!(
                r#"{{"message": "Summarize Q3", "documentIds": ["{}"]}}"#,
                doc_id
            )))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let prompt = client.seen.lock().unwrap().clone();
        assert_eq!(prompt.len(), 3);
        assert!(prompt[1].content.contains("Q3 Financial Statements"));
        assert!(prompt[1].content.contains("Meridian Growth Fund (MGF-II)"));
    }

    #[tokio::test]
    async fn test_send_unknown_document_ids_dropped() {
        let client = ScriptedClient::replying("ok");
        let state = make_state_with(Arc::clone(&client));
        let app = crate::create_router(state);

        let resp = app
            .oneshot(send_json(&format!(
                r#"{{"message": "Summarize", "documentIds": ["{}", "junk"]}}"#,
                Uuid::new_v4()
            )))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        // Nothing resolved, so no context block was added.
        assert_eq!(client.seen.lock().unwrap().len(), 2);
    }

    // ---- Session detail ----

    #[tokio::test]
    async fn test_get_session_returns_ordered_messages() {
        let app = make_app();

        let resp = app
            .clone()
            .oneshot(send_json(r#"{"message": "the question"}"#))
            .await
            .unwrap();
        let sent: SendResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();

        let resp = app
            .oneshot(authed_get(&format!("/chat/sessions/{}", sent.session_id)))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let detail: SessionDetailResponse =
            serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(detail.id, sent.session_id);
        assert_eq!(detail.messages.len(), 2);
        assert_eq!(detail.messages[0].content, "the question");
        assert_eq!(detail.messages[1].content, "Understood.");
    }

    #[tokio::test]
    async fn test_get_unknown_session_returns_null() {
        let app = make_app();
        let resp = app
            .oneshot(authed_get(&format!("/chat/sessions/{}", Uuid::new_v4())))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, b"null");
    }

    #[tokio::test]
    async fn test_get_malformed_session_id_returns_null() {
        let app = make_app();
        let resp = app
            .oneshot(authed_get("/chat/sessions/not-a-uuid"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, b"null");
    }

    #[tokio::test]
    async fn test_get_foreign_session_returns_null() {
        let state = make_state();
        add_user(&state, "other", "other-token");
        let app = crate::create_router(state);

        // Other user creates a session.
        let resp = app
            .clone()
            .oneshot(
                Request::post("/chat/send")
                    .header("authorization", "Bearer other-token")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message": "private"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let sent: SendResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();

        // The primary test user cannot see it.
        let resp = app
            .oneshot(authed_get(&format!("/chat/sessions/{}", sent.session_id)))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, b"null");
    }

    // ---- Session delete ----

    #[tokio::test]
    async fn test_delete_session_removes_it() {
        let app = make_app();

        let resp = app
            .clone()
            .oneshot(send_json(r#"{"message": "to be deleted"}"#))
            .await
            .unwrap();
        let sent: SendResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();

        let resp = app
            .clone()
            .oneshot(authed_delete(&format!("/chat/sessions/{}", sent.session_id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app
            .oneshot(authed_get(&format!("/chat/sessions/{}", sent.session_id)))
            .await
            .unwrap();
        assert_eq!(body_bytes(resp).await, b"null");
    }

    #[tokio::test]
    async fn test_delete_unknown_session_is_no_content() {
        let app = make_app();
        let resp = app
            .oneshot(authed_delete(&format!("/chat/sessions/{}", Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_delete_foreign_session_is_noop() {
        let state = make_state();
        add_user(&state, "other", "other-token");
        let app = crate::create_router(state);

        let resp = app
            .clone()
            .oneshot(
                Request::post("/chat/send")
                    .header("authorization", "Bearer other-token")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message": "keep me"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let sent: SendResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();

        // Primary user "deletes" it: 204, but nothing happens.
        let resp = app
            .clone()
            .oneshot(authed_delete(&format!("/chat/sessions/{}", sent.session_id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        // The owner still sees it.
        let resp = app
            .oneshot(
                Request::get(format!("/chat/sessions/{}", sent.session_id))
                    .header("authorization", "Bearer other-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let detail: SessionDetailResponse =
            serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(detail.id, sent.session_id);
    }

    // ---- Documents ----

    #[tokio::test]
    async fn test_documents_endpoint_lists_all() {
        let state = make_state();
        seed_document(&state, "Q3 Financial Statements");
        seed_document(&state, "Capital Account Statement");
        let app = crate::create_router(state);

        let resp = app.oneshot(authed_get("/documents")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = body_bytes(resp).await;
        let docs: DocumentsResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(docs.documents.len(), 2);

        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value["documents"][0].get("fundName").is_some());
        assert!(value["documents"][0].get("periodStart").is_some());
    }
}
