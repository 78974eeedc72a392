//! Dataset inspection endpoint

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::DocumentSummary;

/// GET /datasets/:dataset_id/documents - List a dataset's documents
pub async fn list_documents(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
) -> Result<Json<Vec<DocumentSummary>>> {
    let dataset = state.documents().get_dataset(&dataset_id).await?;
    let documents = state.documents().list_documents(&dataset.id, None).await?;

    Ok(Json(documents.iter().map(DocumentSummary::from).collect()))
}
