//! Gateway to the external chat-completion provider.
//!
//! One POST per send, bearer credential, fixed timeout. Failures are
//! terminal for the request: no retry, no backoff.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use vault_core::config::AssistantConfig;

use crate::error::ChatError;

/// Timeout for the single outbound request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One message in the provider wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ProviderMessage>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Abstraction over the completion provider, so the send flow can be
/// exercised without a live endpoint.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Whether a credential is configured. Checked before any request is
    /// attempted.
    fn is_configured(&self) -> bool;

    /// Send the assembled message array and return the raw reply text.
    async fn complete(&self, messages: Vec<ProviderMessage>) -> Result<String, ChatError>;
}

/// HTTP implementation of [`CompletionClient`].
pub struct HttpCompletionClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl HttpCompletionClient {
    /// Build a client from assistant settings. The credential may be empty;
    /// that state is reported through [`CompletionClient::is_configured`]
    /// rather than rejected here.
    pub fn new(assistant: &AssistantConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChatError::Provider(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: assistant.api_key.clone(),
            model: assistant.model.clone(),
            base_url: assistant.base_url.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn complete(&self, messages: Vec<ProviderMessage>) -> Result<String, ChatError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Provider(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ChatError::Provider(format!(
                "Provider returned {}: {}",
                status, body_text
            )));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            ChatError::Provider(format!("Failed to parse provider response: {}", e))
        })?;

        extract_content(parsed)
    }
}

fn extract_content(response: ChatCompletionResponse) -> Result<String, ChatError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ChatError::Provider("Provider returned no content".to_string()))
}
