//! Retrieval and answer generation endpoints

use axum::{extract::State, Json};
use std::collections::HashMap;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::generation::{preview, PromptBuilder, PROMPT_PREVIEW_CHARS};
use crate::server::state::AppState;
use crate::types::{GenerateRequest, GenerateResponse, RetrieveRequest, RetrievedChunk};

/// POST /retrieve/ - Similarity search over one or more datasets
pub async fn retrieve_chunks(
    State(state): State<AppState>,
    Json(request): Json<RetrieveRequest>,
) -> Result<Json<Vec<RetrievedChunk>>> {
    let chunks = retrieve(&state, &request).await?;
    Ok(Json(chunks))
}

/// POST /generate/ - Answer a query from retrieved chunks
pub async fn generate_answer(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>> {
    let start = Instant::now();
    let chunks = retrieve(&state, &request.retrieve).await?;

    let sources = resolve_sources(&state, &chunks, &request.retrieve.dataset_ids[0]).await?;
    tracing::debug!("Sources: {:?}", sources);

    let prompt = PromptBuilder::build_rag_prompt(&request.retrieve.query, &chunks);

    let model = if request.model.trim().is_empty() {
        state.config().llm.default_model.as_str()
    } else {
        request.model.as_str()
    };
    let answer = state.llm().complete(model, &prompt).await?;

    tracing::info!(
        "Generated answer with {} ({} chunks) in {}ms",
        model,
        chunks.len(),
        start.elapsed().as_millis()
    );

    Ok(Json(GenerateResponse {
        answer,
        sources,
        prompt_used: preview(&prompt, PROMPT_PREVIEW_CHARS),
    }))
}

async fn retrieve(state: &AppState, request: &RetrieveRequest) -> Result<Vec<RetrievedChunk>> {
    request.validate()?;

    tracing::info!(
        "Retrieve: \"{}\" over {} datasets (limit {}, threshold {})",
        request.query,
        request.dataset_ids.len(),
        request.limit,
        request.similarity_threshold
    );

    let mut chunks = state.documents().retrieve(&request.to_query()).await?;
    chunks.truncate(request.limit);

    tracing::info!("Retrieved {} chunks", chunks.len());
    Ok(chunks)
}

/// Display name of each chunk's document, in chunk order.
///
/// The document is looked up in the chunk's own dataset when the service
/// reports one, else in `fallback_dataset`.
async fn resolve_sources(
    state: &AppState,
    chunks: &[RetrievedChunk],
    fallback_dataset: &str,
) -> Result<Vec<String>> {
    let mut known: HashMap<(String, String), String> = HashMap::new();
    let mut sources = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let dataset_id = chunk.source_dataset().unwrap_or(fallback_dataset);
        let key = (dataset_id.to_string(), chunk.document_id.clone());

        if let Some(name) = known.get(&key) {
            sources.push(name.clone());
            continue;
        }

        let found = state
            .documents()
            .list_documents(dataset_id, Some(&chunk.document_id))
            .await?
            .into_iter()
            .find(|d| d.id == chunk.document_id)
            .map(|d| d.name);

        let name = found
            .or_else(|| chunk.document_keyword.clone())
            .ok_or_else(|| Error::DocumentNotFound(chunk.document_id.clone()))?;

        known.insert(key, name.clone());
        sources.push(name);
    }

    Ok(sources)
}
