//! RAGFlow HTTP client implementing the document service provider
//!
//! Talks to the `/api/v1` surface: datasets, documents, chunk parsing and
//! retrieval. Every response is wrapped in `{code, message, data}`; a
//! non-zero `code` is a failure even when the HTTP status is 200.

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::DocumentServiceConfig;
use crate::error::{Error, Result};
use crate::providers::document_service::DocumentServiceProvider;
use crate::types::{Dataset, DatasetSpec, Document, RetrievalQuery, RetrievedChunk, UploadDocument};

const DOCUMENT_PAGE_SIZE: usize = 100;

/// RAGFlow API client
pub struct RagflowClient {
    client: Client,
    base_url: String,
    api_key: String,
    retrieval_top_k: usize,
}

#[derive(Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize)]
struct DocumentPage {
    #[serde(default)]
    docs: Vec<Document>,
    #[serde(default)]
    total: Option<usize>,
}

#[derive(Deserialize)]
struct RetrievalData {
    #[serde(default)]
    chunks: Vec<RetrievedChunk>,
}

#[derive(Serialize)]
struct DocumentIds<'a> {
    document_ids: &'a [String],
}

#[derive(Serialize)]
struct RetrievalRequest<'a> {
    question: &'a str,
    dataset_ids: &'a [String],
    page: usize,
    page_size: usize,
    similarity_threshold: f32,
    top_k: usize,
}

impl RagflowClient {
    /// Create a new RAGFlow client
    pub fn new(config: &DocumentServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            retrieval_top_k: config.retrieval_top_k,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// Send a request and unwrap the `{code, data}` envelope
    async fn call<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> Result<Option<T>> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::document_service(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::document_service(format!(
                "{} failed ({}): {}",
                what, status, body
            )));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::document_service(format!("Failed to decode {} response: {}", what, e)))?;

        if envelope.code != 0 {
            return Err(Error::document_service(format!(
                "{} rejected (code {}): {}",
                what,
                envelope.code,
                envelope.message.unwrap_or_default()
            )));
        }

        Ok(envelope.data)
    }

    /// Like `call`, but a missing `data` field is an error
    async fn call_data<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> Result<T> {
        self.call(what, request)
            .await?
            .ok_or_else(|| Error::document_service(format!("{} response carried no data", what)))
    }
}

/// RAGFlow answers lookups of unknown or foreign datasets with a generic
/// error code, so "not found" has to be read from the message.
fn is_missing_dataset(err: &Error) -> bool {
    match err {
        Error::DocumentService(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("don't own") || msg.contains("not found") || msg.contains("lacks permission")
        }
        _ => false,
    }
}

#[async_trait]
impl DocumentServiceProvider for RagflowClient {
    async fn create_dataset(&self, spec: &DatasetSpec) -> Result<Dataset> {
        tracing::info!(
            "Creating dataset '{}' (embedding: {}, chunking: {})",
            spec.name,
            spec.embedding_model,
            spec.chunk_method
        );
        let request = self.client.post(self.url("/datasets")).json(spec);
        self.call_data("create dataset", request).await
    }

    async fn get_dataset(&self, dataset_id: &str) -> Result<Dataset> {
        let request = self
            .client
            .get(self.url("/datasets"))
            .query(&[("id", dataset_id), ("page", "1"), ("page_size", "1")]);

        let datasets: Vec<Dataset> = match self.call("list datasets", request).await {
            Ok(data) => data.unwrap_or_default(),
            Err(e) if is_missing_dataset(&e) => {
                return Err(Error::DatasetNotFound(dataset_id.to_string()))
            }
            Err(e) => return Err(e),
        };

        datasets
            .into_iter()
            .find(|d| d.id == dataset_id)
            .ok_or_else(|| Error::DatasetNotFound(dataset_id.to_string()))
    }

    async fn upload_documents(
        &self,
        dataset_id: &str,
        documents: &[UploadDocument],
    ) -> Result<Vec<Document>> {
        let mut form = multipart::Form::new();
        for doc in documents {
            let mime = mime_guess::from_path(&doc.display_name).first_or_octet_stream();
            let part = multipart::Part::bytes(doc.blob.clone())
                .file_name(doc.display_name.clone())
                .mime_str(mime.as_ref())?;
            form = form.part("file", part);
        }

        let request = self
            .client
            .post(self.url(&format!("/datasets/{}/documents", dataset_id)))
            .multipart(form);
        self.call_data("upload documents", request).await
    }

    async fn list_documents(
        &self,
        dataset_id: &str,
        document_id: Option<&str>,
    ) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page = 1usize;

        loop {
            let mut query = vec![
                ("page", page.to_string()),
                ("page_size", DOCUMENT_PAGE_SIZE.to_string()),
            ];
            if let Some(id) = document_id {
                query.push(("id", id.to_string()));
            }

            let request = self
                .client
                .get(self.url(&format!("/datasets/{}/documents", dataset_id)))
                .query(&query);

            let batch: DocumentPage = match self.call("list documents", request).await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) if document_id.is_some() && is_missing_dataset(&e) => {
                    // RAGFlow reports a foreign document id the same way
                    return Ok(Vec::new());
                }
                Err(e) if is_missing_dataset(&e) => {
                    return Err(Error::DatasetNotFound(dataset_id.to_string()))
                }
                Err(e) => return Err(e),
            };

            let fetched = batch.docs.len();
            documents.extend(batch.docs);

            let reached_total = batch.total.is_some_and(|total| documents.len() >= total);
            if fetched < DOCUMENT_PAGE_SIZE || reached_total {
                break;
            }
            page += 1;
        }

        Ok(documents)
    }

    async fn start_parsing(&self, dataset_id: &str, document_ids: &[String]) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("/datasets/{}/chunks", dataset_id)))
            .json(&DocumentIds { document_ids });
        self.call::<serde_json::Value>("start parsing", request).await?;
        Ok(())
    }

    async fn stop_parsing(&self, dataset_id: &str, document_ids: &[String]) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&format!("/datasets/{}/chunks", dataset_id)))
            .json(&DocumentIds { document_ids });
        self.call::<serde_json::Value>("stop parsing", request).await?;
        Ok(())
    }

    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievedChunk>> {
        let body = RetrievalRequest {
            question: &query.question,
            dataset_ids: &query.dataset_ids,
            page: 1,
            page_size: query.limit,
            similarity_threshold: query.similarity_threshold,
            top_k: self.retrieval_top_k.max(query.limit),
        };
        let request = self.client.post(self.url("/retrieval")).json(&body);
        let data: Option<RetrievalData> = self.call("retrieval", request).await?;

        let mut chunks = data.map(|d| d.chunks).unwrap_or_default();
        chunks.truncate(query.limit);
        Ok(chunks)
    }

    async fn health_check(&self) -> Result<bool> {
        let request = self
            .client
            .get(self.url("/datasets"))
            .query(&[("page", "1"), ("page_size", "1")]);

        match self.call::<serde_json::Value>("health check", request).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Document service not ready: {}", e);
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        "ragflow"
    }
}
