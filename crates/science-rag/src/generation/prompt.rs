//! Prompt templates for RAG generation

use crate::types::RetrievedChunk;

/// Characters of each chunk placed into the prompt
pub const CHUNK_PREVIEW_CHARS: usize = 500;
/// Characters of the prompt echoed back as `prompt_used`
pub const PROMPT_PREVIEW_CHARS: usize = 500;

const ELLIPSIS: &str = "...";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the context block: one `Document i:` entry per chunk
    pub fn build_context(chunks: &[RetrievedChunk]) -> String {
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                format!(
                    "Document {}:\n{}",
                    i + 1,
                    preview(&chunk.content, CHUNK_PREVIEW_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Build the full prompt sent as the single user message
    pub fn build_rag_prompt(query: &str, chunks: &[RetrievedChunk]) -> String {
        format!(
            r#"You are an assistant that has access to multiple documents.

Context retrieved from the documents:
{context}

User's query: {query}

Give an answer based only on the retrieved context. If the context does not contain the answer, say so explicitly."#,
            context = Self::build_context(chunks),
            query = query
        )
    }
}

/// First `max_chars` characters of `text` followed by `...`.
///
/// Counts chars, not bytes, so multi-byte text is never split. The suffix
/// is always appended, making the result at most `max_chars + 3` long.
pub fn preview(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    format!("{}{}", head, ELLIPSIS)
}
