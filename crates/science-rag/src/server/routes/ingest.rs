//! Dataset upload and parsing endpoints

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::ingestion::StagingArea;
use crate::processing::{wait_for_parsing, ParseOutcome, ParseWaitOptions};
use crate::server::state::AppState;
use crate::types::{
    DatasetSpec, ParseParams, ParseResponse, RunStatus, UploadParams, UploadResponse,
};

/// POST /upload-dataset/ - Create a dataset from uploaded files
///
/// `name`, `chunk_method` and `embedding_model` come from the query string
/// or from multipart text fields; text fields take precedence.
pub async fn upload_dataset(
    State(state): State<AppState>,
    Query(mut params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let start = Instant::now();
    let mut staging = StagingArea::new()?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        let filename = field.file_name().map(str::to_string);

        if filename.is_none() && matches!(name.as_str(), "name" | "chunk_method" | "embedding_model") {
            let value = field
                .text()
                .await
                .map_err(|e| Error::validation(format!("Failed to read field '{}': {}", name, e)))?;
            let slot = match name.as_str() {
                "name" => &mut params.name,
                "chunk_method" => &mut params.chunk_method,
                _ => &mut params.embedding_model,
            };
            *slot = Some(value);
            continue;
        }

        if filename.is_none() && name != "files" {
            tracing::debug!("Ignoring multipart field '{}'", name);
            continue;
        }

        let data = field.bytes().await.map_err(|e| {
            Error::validation(format!(
                "Failed to read file '{}': {}",
                filename.as_deref().unwrap_or("<unnamed>"),
                e
            ))
        })?;
        let staged = staging.stage(filename.as_deref(), &data).await?;
        tracing::info!("Staged file: {} ({} bytes)", staged.display_name, staged.size);
    }

    if staging.is_empty() {
        return Err(Error::validation("at least one file is required"));
    }

    let defaults = &state.config().defaults;
    let pick = |value: Option<String>, fallback: &str| {
        value
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    };
    let spec = DatasetSpec {
        name: pick(params.name, &defaults.name),
        embedding_model: pick(params.embedding_model, &defaults.embedding_model),
        chunk_method: pick(params.chunk_method, &defaults.chunk_method),
    };

    let dataset = state.documents().create_dataset(&spec).await?;
    let payloads = staging.load_documents().await?;
    let uploaded = state
        .documents()
        .upload_documents(&dataset.id, &payloads)
        .await?;

    tracing::info!(
        "Dataset '{}' ({}) created with {} documents in {}ms",
        spec.name,
        dataset.id,
        uploaded.len(),
        start.elapsed().as_millis()
    );

    if let Err(e) = staging.close() {
        tracing::warn!("Failed to remove staging directory: {}", e);
    }

    Ok(Json(UploadResponse::success(dataset.id)))
}

/// POST /parse-documents/ - Parse every unparsed document of a dataset
///
/// Blocks until the document service has finished with every submitted
/// document. Failed documents, shutdown and timeouts are errors.
pub async fn parse_documents(
    State(state): State<AppState>,
    Query(params): Query<ParseParams>,
) -> Result<Json<ParseResponse>> {
    let start = Instant::now();
    let dataset = state.documents().get_dataset(&params.dataset_id).await?;
    let documents = state.documents().list_documents(&dataset.id, None).await?;

    if documents.is_empty() {
        tracing::warn!("Dataset {} has no documents to parse", dataset.id);
        return Ok(Json(ParseResponse::success(dataset.id)));
    }

    let pending: Vec<String> = documents
        .iter()
        .filter(|d| d.run != RunStatus::Done)
        .map(|d| d.id.clone())
        .collect();

    if pending.is_empty() {
        tracing::info!(
            "All {} documents of dataset {} already parsed",
            documents.len(),
            dataset.id
        );
        return Ok(Json(ParseResponse::success(dataset.id)));
    }

    tracing::info!(
        "Parsing {} of {} documents in dataset {}",
        pending.len(),
        documents.len(),
        dataset.id
    );
    state.documents().start_parsing(&dataset.id, &pending).await?;

    let service = &state.config().document_service;
    let options = ParseWaitOptions {
        poll_interval: service.poll_interval(),
        timeout: service.parse_timeout(),
    };
    let outcome = wait_for_parsing(
        state.documents(),
        &dataset.id,
        &pending,
        options,
        state.shutdown_signal(),
    )
    .await?;

    match &outcome {
        ParseOutcome::Completed(reports) => {
            for report in reports {
                tracing::info!(
                    "Document {} ({}) parsing finished with status: {}, chunks: {}, tokens: {}",
                    report.id,
                    report.name,
                    report.status,
                    report.chunk_count,
                    report.token_count
                );
            }

            let failed: Vec<String> = outcome
                .failures()
                .into_iter()
                .map(|r| r.name.clone())
                .collect();
            if !failed.is_empty() {
                return Err(Error::ParseFailed {
                    dataset_id: dataset.id,
                    documents: failed,
                });
            }
        }
        ParseOutcome::Interrupted { cancelled } => {
            tracing::warn!(
                "Parsing of dataset {} interrupted, {} pending documents cancelled",
                dataset.id,
                cancelled.len()
            );
            return Err(Error::ParseInterrupted {
                dataset_id: dataset.id,
                cancelled: cancelled.len(),
            });
        }
        ParseOutcome::TimedOut { cancelled } => {
            tracing::warn!(
                "Parsing of dataset {} timed out, {} pending documents cancelled",
                dataset.id,
                cancelled.len()
            );
            return Err(Error::ParseTimeout {
                dataset_id: dataset.id,
                secs: options.timeout.as_secs(),
            });
        }
    }

    tracing::info!(
        "Dataset {} parsed in {:.1}s",
        dataset.id,
        start.elapsed().as_secs_f64()
    );
    Ok(Json(ParseResponse::success(dataset.id)))
}
