//! Dataset, document and chunk types shared with the document service

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A dataset owned by the external document service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Opaque identifier assigned by the service
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub embedding_model: String,
    #[serde(default)]
    pub chunk_method: String,
}

/// Parameters for creating a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub name: String,
    pub embedding_model: String,
    pub chunk_method: String,
}

/// Parsing state of a document, as reported by the document service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Unstart,
    Running,
    Cancel,
    Done,
    Fail,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether parsing has stopped for this document
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Fail | Self::Cancel)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unstart => "UNSTART",
            Self::Running => "RUNNING",
            Self::Cancel => "CANCEL",
            Self::Done => "DONE",
            Self::Fail => "FAIL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Unstart
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document inside a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Display name (the uploaded file name)
    pub name: String,
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub run: RunStatus,
    #[serde(default)]
    pub chunk_count: u64,
    #[serde(default)]
    pub token_count: u64,
}

/// A named payload to upload as a document
#[derive(Debug, Clone)]
pub struct UploadDocument {
    pub display_name: String,
    pub blob: Vec<u8>,
}

/// A chunk returned by similarity search.
///
/// Only the fields this service reads are typed; everything else the
/// document service sends is kept in `extra` and passed through as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RetrievedChunk {
    /// Minimal chunk, mostly useful for tests and fakes
    pub fn new(document_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            document_id: document_id.into(),
            dataset_id: None,
            document_keyword: None,
            similarity: None,
            extra: Map::new(),
        }
    }

    /// Dataset the chunk came from; older services only send `kb_id`
    pub fn source_dataset(&self) -> Option<&str> {
        self.dataset_id
            .as_deref()
            .or_else(|| self.extra.get("kb_id").and_then(Value::as_str))
    }
}

/// Similarity search scoped to a set of datasets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalQuery {
    pub question: String,
    pub dataset_ids: Vec<String>,
    pub limit: usize,
    pub similarity_threshold: f32,
}
