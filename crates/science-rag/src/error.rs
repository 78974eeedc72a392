//! Error types for the orchestration API and its clients

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for science-rag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Orchestration errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected request input
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Dataset unknown to the document service
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// Document unknown to the document service
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Document service reported a failure
    #[error("Document service error: {0}")]
    DocumentService(String),

    /// Completion service error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Some documents ended parsing in a failed or cancelled state
    #[error("Parsing failed for dataset {dataset_id}: {documents:?}")]
    ParseFailed {
        dataset_id: String,
        documents: Vec<String>,
    },

    /// Parsing was interrupted and pending work cancelled
    #[error("Parsing interrupted for dataset {dataset_id}, {cancelled} pending documents cancelled")]
    ParseInterrupted { dataset_id: String, cancelled: usize },

    /// Parsing did not finish in time and pending work was cancelled
    #[error("Parsing timed out for dataset {dataset_id} after {secs}s")]
    ParseTimeout { dataset_id: String, secs: u64 },

    /// Non-success answer from the orchestration API (client side)
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a document service error
    pub fn document_service(message: impl Into<String>) -> Self {
        Self::DocumentService(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status and machine-readable type for this error
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Error::DatasetNotFound(_) => (StatusCode::NOT_FOUND, "dataset_not_found"),
            Error::DocumentNotFound(_) => (StatusCode::NOT_FOUND, "document_not_found"),
            Error::DocumentService(_) => (StatusCode::BAD_GATEWAY, "document_service_error"),
            Error::Llm(_) => (StatusCode::SERVICE_UNAVAILABLE, "llm_error"),
            Error::ParseFailed { .. } => (StatusCode::BAD_GATEWAY, "parse_failed"),
            Error::ParseInterrupted { .. } => (StatusCode::SERVICE_UNAVAILABLE, "parse_interrupted"),
            Error::ParseTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "parse_timeout"),
            Error::Api { .. } => (StatusCode::BAD_GATEWAY, "upstream_api_error"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = self.classify();

        if status.is_server_error() {
            tracing::error!("{} ({})", self, error_type);
        } else {
            tracing::debug!("{} ({})", self, error_type);
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
