//! HTTP client for the orchestration API

use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::{
    DocumentSummary, GenerateRequest, GenerateResponse, HealthResponse, ParseResponse,
    RetrieveRequest, RetrievedChunk, UploadDocument, UploadParams, UploadResponse,
};

/// Error body written by the API
#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Client for the orchestration API.
///
/// Every call is a single awaited request bounded by the timeout
/// configured for its kind; there are no retries.
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        self.config.api_base_url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// GET /health
    pub async fn health(&self) -> Result<HealthResponse> {
        let request = self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(self.config.health_timeout_secs));
        send(request).await
    }

    /// POST /upload-dataset/ with in-memory documents
    pub async fn upload_dataset(
        &self,
        documents: &[UploadDocument],
        params: &UploadParams,
    ) -> Result<UploadResponse> {
        let mut form = multipart::Form::new();
        for (field, value) in [
            ("name", &params.name),
            ("chunk_method", &params.chunk_method),
            ("embedding_model", &params.embedding_model),
        ] {
            if let Some(value) = value {
                form = form.text(field, value.clone());
            }
        }
        for doc in documents {
            let mime = mime_guess::from_path(&doc.display_name).first_or_octet_stream();
            let part = multipart::Part::bytes(doc.blob.clone())
                .file_name(doc.display_name.clone())
                .mime_str(mime.as_ref())?;
            form = form.part("files", part);
        }

        let request = self
            .client
            .post(self.url("/upload-dataset/"))
            .timeout(Duration::from_secs(self.config.upload_timeout_secs))
            .multipart(form);
        send(request).await
    }

    /// POST /upload-dataset/ with files read from disk
    pub async fn upload_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        params: &UploadParams,
    ) -> Result<UploadResponse> {
        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let blob = tokio::fs::read(path).await?;
            let display_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::validation(format!("Not a file: {}", path.display())))?;
            documents.push(UploadDocument { display_name, blob });
        }
        self.upload_dataset(&documents, params).await
    }

    /// POST /parse-documents/
    pub async fn parse_documents(&self, dataset_id: &str) -> Result<ParseResponse> {
        let request = self
            .client
            .post(self.url("/parse-documents/"))
            .query(&[("dataset_id", dataset_id)])
            .timeout(Duration::from_secs(self.config.parse_timeout_secs));
        send(request).await
    }

    /// POST /retrieve/
    pub async fn retrieve(&self, request: &RetrieveRequest) -> Result<Vec<RetrievedChunk>> {
        let request = self
            .client
            .post(self.url("/retrieve/"))
            .timeout(Duration::from_secs(self.config.generate_timeout_secs))
            .json(request);
        send(request).await
    }

    /// POST /generate/
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let request = self
            .client
            .post(self.url("/generate/"))
            .timeout(Duration::from_secs(self.config.generate_timeout_secs))
            .json(request);
        send(request).await
    }

    /// GET /datasets/{id}/documents
    pub async fn list_documents(&self, dataset_id: &str) -> Result<Vec<DocumentSummary>> {
        let request = self
            .client
            .get(self.url(&format!("/datasets/{}/documents", dataset_id)))
            .timeout(Duration::from_secs(self.config.health_timeout_secs.max(10)));
        send(request).await
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    decode(response).await
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => format!("{}: {}", body.error.kind, body.error.message),
        Err(_) if text.is_empty() => status.to_string(),
        Err(_) => text,
    };

    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{spawn_api, MemoryDocumentService, StubLlm};

    async fn serve(llm: StubLlm) -> (ApiClient, crate::server::state::AppState) {
        let (base_url, state) = spawn_api(MemoryDocumentService::new().with_parse_polls(1), llm).await;
        let client = ApiClient::new(ClientConfig::default().with_base_url(base_url)).unwrap();
        (client, state)
    }

    fn text_file(name: &str, body: &str) -> UploadDocument {
        UploadDocument {
            display_name: name.to_string(),
            blob: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_flow() {
        let (client, state) = serve(StubLlm::answering("The document says hello.")).await;

        assert_eq!(client.health().await.unwrap().status, "healthy");

        let params = UploadParams {
            name: Some("t1".to_string()),
            ..Default::default()
        };
        let uploaded = client
            .upload_dataset(
                &[text_file("a.txt", "Hello world"), text_file("b.txt", "Goodbye world")],
                &params,
            )
            .await
            .unwrap();
        assert!(uploaded.is_success());
        let dataset_id = uploaded.dataset_id;

        let documents = client.list_documents(&dataset_id).await.unwrap();
        assert_eq!(documents.len(), 2);

        let parsed = client.parse_documents(&dataset_id).await.unwrap();
        assert_eq!(parsed.status, "parsing_success");

        let retrieve = RetrieveRequest::new("Hello", vec![dataset_id.clone()])
            .with_limit(1)
            .with_threshold(0.0);
        let chunks = client.retrieve(&retrieve).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello world");

        let generated = client
            .generate(&GenerateRequest::new(retrieve, "mistral-tiny"))
            .await
            .unwrap();
        assert!(!generated.answer.is_empty());
        assert_eq!(generated.sources, vec!["a.txt".to_string()]);

        state.trigger_shutdown();
    }

    #[tokio::test]
    async fn test_error_status_is_surfaced() {
        let (client, state) = serve(StubLlm::answering("unused")).await;

        let err = client.parse_documents("missing").await.unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 404);
                assert!(message.starts_with("dataset_not_found"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        state.trigger_shutdown();
    }

    #[tokio::test]
    async fn test_unreachable_api() {
        let client = ApiClient::new(ClientConfig::default().with_base_url("http://127.0.0.1:1"))
            .unwrap();
        assert!(client.health().await.is_err());
    }
}
