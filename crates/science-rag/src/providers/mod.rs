//! Provider abstractions for the external document and completion services
//!
//! Handlers only see the traits, so the HTTP clients below can be swapped
//! for in-memory doubles in tests.

pub mod document_service;
pub mod llm;
pub mod openai;
pub mod ragflow;

pub use document_service::DocumentServiceProvider;
pub use llm::LlmProvider;
pub use openai::OpenAiCompatClient;
pub use ragflow::RagflowClient;
