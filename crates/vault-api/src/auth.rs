//! API authentication via bearer tokens.
//!
//! Provides token generation, persistence for the bootstrap admin token, and
//! middleware that resolves `Authorization: Bearer <token>` headers to a user
//! row. The resolved user is attached to the request extensions so handlers
//! can scope every query to the caller.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;

use vault_storage::UserRepository;

use crate::state::AppState;

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Load the bootstrap token from file, or generate and save a new one.
pub fn load_or_generate_token(token_path: &std::path::Path) -> String {
    // Try to read existing token
    if let Ok(contents) = std::fs::read_to_string(token_path) {
        let token = contents.trim().to_string();
        if !token.is_empty() {
            tracing::info!("API token loaded from {}", token_path.display());
            return token;
        }
    }

    // Generate new token
    let token = generate_token();

    // Save to file
    if let Some(parent) = token_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(token_path, &token) {
        tracing::warn!(error = %e, "Failed to save API token to {}", token_path.display());
    } else {
        // Restrict token file to owner-only access.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(token_path, std::fs::Permissions::from_mode(0o600));
        }
        tracing::info!("API token saved to {}", token_path.display());
    }

    token
}

/// Middleware that validates Bearer token authentication.
///
/// Extracts the token from `Authorization: Bearer <token>`, resolves it
/// against the users table, and attaches the matching [`vault_core::types::User`]
/// to the request. Returns 401 if missing or invalid. Ownership is re-checked
/// on every request; nothing is cached between calls.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let auth_header = req.headers().get("authorization");

    match auth_header {
        Some(value) => {
            let value_str = match value.to_str() {
                Ok(s) => s,
                Err(_) => {
                    return (
                        StatusCode::UNAUTHORIZED,
                        Json(serde_json::json!({
                            "error": "unauthorized",
                            "message": "Invalid Authorization header encoding"
                        })),
                    )
                        .into_response();
                }
            };

            if let Some(token) = value_str.strip_prefix("Bearer ") {
                let users = UserRepository::new(Arc::clone(&state.database));
                match users.find_by_token(token) {
                    Ok(Some(user)) => {
                        req.extensions_mut().insert(user);
                        return next.run(req).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "Token lookup failed");
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(serde_json::json!({
                                "error": "internal_error",
                                "message": "Failed to validate credentials"
                            })),
                        )
                            .into_response();
                    }
                }
            }

            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "unauthorized",
                    "message": "Invalid bearer token"
                })),
            )
                .into_response()
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": "Missing Authorization header"
            })),
        )
            .into_response(),
    }
}
