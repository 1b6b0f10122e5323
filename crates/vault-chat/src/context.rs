//! Prompt assembly for the assistant provider.
//!
//! Builds the message array sent upstream: a fixed system instruction, an
//! optional second system message carrying rendered document metadata, then
//! the chronological history window.

use vault_core::types::{ChatMessage, DocumentContext};

use crate::provider::ProviderMessage;

/// Primary system instruction for every conversation.
pub const SYSTEM_PROMPT: &str = "You are the audit assistant for a fund documentation vault. \
Auditors and fund managers use you to understand the compliance documents they have access to: \
financial statements, capital account statements, certificates, and related records. \
Answer concisely and factually, in plain text without markdown formatting.";

/// Render one document as a fixed-format text block.
fn render_document(doc: &DocumentContext) -> String {
    format!(
        "Document: {}\nFund: {} ({})\nType: {}\nStatus: {}\nPeriod: {} to {}\nDescription: {}",
        doc.title,
        doc.fund_name,
        doc.fund_code,
        doc.doc_type,
        doc.status,
        doc.period_start.format("%Y-%m-%d"),
        doc.period_end.format("%Y-%m-%d"),
        doc.description.as_deref().unwrap_or("n/a"),
    )
}

/// Render the secondary system instruction carrying document metadata.
///
/// Instructs the model to stay inside the supplied data and to say when the
/// answer is not in it, rather than guessing.
pub fn build_context_instruction(documents: &[DocumentContext]) -> String {
    let blocks = documents
        .iter()
        .map(render_document)
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "The user has attached metadata for the following documents:\n\n{}\n\n\
         Answer using only the document metadata above and the conversation so far. \
         If the information needed to answer is not present, say so explicitly.",
        blocks
    )
}

/// Assemble the full provider message array.
///
/// Order is fixed: primary system prompt, the document context block when
/// any documents were resolved, then history oldest to newest. The history
/// already ends with the user message being answered.
pub fn assemble_messages(
    documents: &[DocumentContext],
    history: &[ChatMessage],
) -> Vec<ProviderMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);

    messages.push(ProviderMessage {
        role: "system".to_string(),
        content: SYSTEM_PROMPT.to_string(),
    });

    if !documents.is_empty() {
        messages.push(ProviderMessage {
            role: "system".to_string(),
            content: build_context_instruction(documents),
        });
    }

    for message in history {
        messages.push(ProviderMessage {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        });
    }

    messages
}
