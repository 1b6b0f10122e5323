//! Error types for the assistant pipeline.

use vault_core::error::VaultError;

/// Errors from the chat send flow.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("assistant credential is not configured")]
    MissingCredential,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<VaultError> for ChatError {
    fn from(err: VaultError) -> Self {
        ChatError::StorageError(err.to_string())
    }
}

impl From<ChatError> for VaultError {
    fn from(err: ChatError) -> Self {
        VaultError::Api(err.to_string())
    }
}
