//! HTTP API for the Audit Vault assistant backend.
//!
//! Exposes the chat endpoints (send, session list/detail/delete), the
//! document picker, and a public health check. All other routes require a
//! bearer token resolved against the users table.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
