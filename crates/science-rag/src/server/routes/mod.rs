//! API routes for the orchestration server

pub mod documents;
pub mod ingest;
pub mod query;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Upload - with larger body limit for file uploads
        .route(
            "/upload-dataset/",
            post(ingest::upload_dataset).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/parse-documents/", post(ingest::parse_documents))
        .route("/retrieve/", post(query::retrieve_chunks))
        .route("/generate/", post(query::generate_answer))
        .route("/datasets/:dataset_id/documents", get(documents::list_documents))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "science-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "RAG orchestration over an external document service and completion endpoint",
        "endpoints": {
            "POST /upload-dataset/": "Create a dataset from uploaded files",
            "POST /parse-documents/?dataset_id=": "Parse a dataset's documents (blocks until done)",
            "POST /retrieve/": "Similarity search over datasets",
            "POST /generate/": "Answer a query with sources",
            "GET /datasets/:dataset_id/documents": "List a dataset's documents",
            "GET /health": "Liveness check",
            "GET /ready": "Dependency readiness check"
        }
    }))
}
