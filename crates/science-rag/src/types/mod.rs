//! Core types for the orchestration API

pub mod dataset;
pub mod query;
pub mod response;

pub use dataset::{
    Dataset, DatasetSpec, Document, RetrievalQuery, RetrievedChunk, RunStatus, UploadDocument,
};
pub use query::{GenerateRequest, ParseParams, RetrieveRequest, UploadParams};
pub use response::{
    DocumentSummary, GenerateResponse, HealthResponse, ParseResponse, ReadinessResponse,
    UploadResponse,
};
