//! Prompt assembly for answer generation

pub mod prompt;

pub use prompt::{preview, PromptBuilder, CHUNK_PREVIEW_CHARS, PROMPT_PREVIEW_CHARS};
