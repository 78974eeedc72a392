//! science-rag: RAG orchestration over an external document service
//!
//! The crate exposes a small HTTP API that turns uploaded files into a
//! dataset on a RAGFlow-compatible document service, waits for it to be
//! parsed, retrieves relevant chunks and asks an OpenAI-compatible
//! completion endpoint for an answer with sources. A console client and a
//! smoke-test harness for that API live in [`client`].

pub mod client;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod server;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ClientConfig, RagConfig};
pub use error::{Error, Result};
pub use types::{
    dataset::{Dataset, Document, RetrievedChunk, RunStatus},
    query::{GenerateRequest, RetrieveRequest},
    response::{GenerateResponse, ParseResponse, UploadResponse},
};
