//! Assistant pipeline for Audit Vault.
//!
//! Provides session resolution, prompt assembly from document metadata and
//! message history, the provider gateway, and reply sanitization.

pub mod context;
pub mod error;
pub mod provider;
pub mod sanitize;
pub mod service;

pub use error::ChatError;
pub use provider::{CompletionClient, HttpCompletionClient, ProviderMessage};
pub use sanitize::sanitize;
pub use service::{ChatService, SendOutcome, SendRequest, HISTORY_WINDOW, MAX_MESSAGE_LENGTH};
