//! Response types for the orchestration API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::dataset::{Document, RunStatus};

/// Status string of a successful upload
pub const UPLOAD_SUCCESS: &str = "success";
/// Status string of a successful parse
pub const PARSE_SUCCESS: &str = "parsing_success";

/// Response of `POST /upload-dataset/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub dataset_id: String,
}

impl UploadResponse {
    pub fn success(dataset_id: impl Into<String>) -> Self {
        Self {
            status: UPLOAD_SUCCESS.to_string(),
            dataset_id: dataset_id.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UPLOAD_SUCCESS
    }
}

/// Response of `POST /parse-documents/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResponse {
    pub status: String,
    pub dataset_id: String,
}

impl ParseResponse {
    pub fn success(dataset_id: impl Into<String>) -> Self {
        Self {
            status: PARSE_SUCCESS.to_string(),
            dataset_id: dataset_id.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PARSE_SUCCESS
    }
}

/// Response of `POST /generate/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Completion text
    pub answer: String,
    /// Display name of each retrieved chunk's document, in chunk order
    pub sources: Vec<String>,
    /// Head of the prompt that was sent, for debugging
    pub prompt_used: String,
}

/// Response of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: "science_rag_api".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Response of `GET /ready`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub document_service: bool,
    pub completion_service: bool,
}

/// Document entry of `GET /datasets/{id}/documents`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub run: RunStatus,
    pub chunk_count: u64,
    pub token_count: u64,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            run: doc.run,
            chunk_count: doc.chunk_count,
            token_count: doc.token_count,
        }
    }
}
