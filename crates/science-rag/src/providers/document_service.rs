//! Document service provider trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Dataset, DatasetSpec, Document, RetrievalQuery, RetrievedChunk, UploadDocument};

/// External service that owns datasets, parses documents and runs
/// similarity search.
///
/// Implementations:
/// - `RagflowClient`: RAGFlow HTTP API
#[async_trait]
pub trait DocumentServiceProvider: Send + Sync {
    /// Create an empty dataset
    async fn create_dataset(&self, spec: &DatasetSpec) -> Result<Dataset>;

    /// Look up a dataset by id
    ///
    /// Fails with `Error::DatasetNotFound` when the service does not know it.
    async fn get_dataset(&self, dataset_id: &str) -> Result<Dataset>;

    /// Upload payloads as documents of a dataset, in one call
    async fn upload_documents(
        &self,
        dataset_id: &str,
        documents: &[UploadDocument],
    ) -> Result<Vec<Document>>;

    /// List a dataset's documents, optionally only the one with `document_id`
    async fn list_documents(
        &self,
        dataset_id: &str,
        document_id: Option<&str>,
    ) -> Result<Vec<Document>>;

    /// Submit documents for parsing; returns once the service accepted them
    async fn start_parsing(&self, dataset_id: &str, document_ids: &[String]) -> Result<()>;

    /// Cancel parsing of documents
    async fn stop_parsing(&self, dataset_id: &str, document_ids: &[String]) -> Result<()>;

    /// Similarity search, most similar first
    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievedChunk>>;

    /// Check if the service is reachable and the key is accepted
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
