//! Prompt assembly: fixed system instruction, retrieved context, and the
//! running conversation rendered into model input.

use itertools::Itertools;

use super::session::{Role, Session};
use crate::gemini::{Message, MessageRole};
use crate::store::SearchResult;

/// Fixed instruction the assistant answers under. The reply must come from
/// the provided context only, mirror the user's language, and state
/// unavailability outright when the context has no answer.
pub const SYSTEM_PROMPT: &str = "You are a professional AI Assistant for NADRA (National Database and Registration Authority). \
Your objective is to provide accurate information based ONLY on the provided SOP documents. \
Guidelines:\n\
1. Answer in the same language as the user (English or Urdu).\n\
2. If the information is not in the documents, strictly state that the info is unavailable.\n\
3. Format responses with clear bullet points for readability.\n\
4. Maintain a polite and professional tone.";

/// Render the system instruction with the retrieved chunks appended.
#[inline]
pub fn build_system_instruction(context: &[SearchResult]) -> String {
    if context.is_empty() {
        return SYSTEM_PROMPT.to_string();
    }

    let context_block = context
        .iter()
        .map(|result| {
            let source = result.metadata.page_number.map_or_else(
                || result.metadata.doc_title.clone(),
                |page| format!("{}, page {}", result.metadata.doc_title, page),
            );
            format!("[{}]\n{}", source, result.metadata.content.trim())
        })
        .join("\n\n---\n\n");

    format!(
        "{}\n\nContext from the SOP documents:\n\n{}",
        SYSTEM_PROMPT, context_block
    )
}

/// Map the running conversation onto API messages, in order. The latest
/// user question is expected to already be the last turn.
#[inline]
pub fn build_messages(session: &Session) -> Vec<Message> {
    session
        .turns()
        .iter()
        .map(|turn| Message {
            role: match turn.role {
                Role::User => MessageRole::User,
                Role::Assistant => MessageRole::Model,
            },
            text: turn.content.clone(),
        })
        .collect()
}
