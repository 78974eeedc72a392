//! Request types for the orchestration API

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::dataset::RetrievalQuery;

/// Optional parameters of `POST /upload-dataset/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadParams {
    pub name: Option<String>,
    pub chunk_method: Option<String>,
    pub embedding_model: Option<String>,
}

/// Query string of `POST /parse-documents/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseParams {
    pub dataset_id: String,
}

/// Body of `POST /retrieve/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
    /// The question to search for
    pub query: String,

    /// Datasets to search (at least one)
    pub dataset_ids: Vec<String>,

    /// Maximum number of chunks (default: 10)
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Minimum similarity (0.0-1.0, default: 0.2)
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f32,
}

fn default_limit() -> usize {
    10
}

fn default_threshold() -> f32 {
    0.2
}

impl RetrieveRequest {
    /// Create a request with default limit and threshold
    pub fn new(query: impl Into<String>, dataset_ids: Vec<String>) -> Self {
        Self {
            query: query.into(),
            dataset_ids,
            limit: default_limit(),
            similarity_threshold: default_threshold(),
        }
    }

    /// Set the number of chunks to retrieve
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the similarity threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Check the request before anything is sent downstream
    pub fn validate(&self) -> Result<()> {
        if self.dataset_ids.is_empty() {
            return Err(Error::validation("dataset_ids must contain at least one dataset"));
        }
        if self.dataset_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(Error::validation("dataset_ids must not contain empty identifiers"));
        }
        if self.limit == 0 {
            return Err(Error::validation("limit must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::validation(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }

    /// Translate into a document service search
    pub fn to_query(&self) -> RetrievalQuery {
        RetrievalQuery {
            question: self.query.clone(),
            dataset_ids: self.dataset_ids.clone(),
            limit: self.limit,
            similarity_threshold: self.similarity_threshold,
        }
    }
}

/// Body of `POST /generate/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(flatten)]
    pub retrieve: RetrieveRequest,

    /// Completion model; empty means the configured default
    #[serde(default)]
    pub model: String,
}

impl GenerateRequest {
    pub fn new(retrieve: RetrieveRequest, model: impl Into<String>) -> Self {
        Self {
            retrieve,
            model: model.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retrieve_defaults() {
        let req: RetrieveRequest = serde_json::from_value(json!({
            "query": "What is a hierarchical time series?",
            "dataset_ids": ["ds1"]
        }))
        .unwrap();
        assert_eq!(req.limit, 10);
        assert!((req.similarity_threshold - 0.2).abs() < f32::EPSILON);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_retrieve_validation() {
        let empty = RetrieveRequest::new("q", vec![]);
        assert!(matches!(empty.validate(), Err(Error::Validation(_))));

        let zero = RetrieveRequest::new("q", vec!["ds".into()]).with_limit(0);
        assert!(zero.validate().is_err());

        let high = RetrieveRequest::new("q", vec!["ds".into()]).with_threshold(1.5);
        assert!(high.validate().is_err());

        let edge = RetrieveRequest::new("q", vec!["ds".into()]).with_threshold(1.0);
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_generate_request_is_flat() {
        let req: GenerateRequest = serde_json::from_value(json!({
            "query": "Hello",
            "dataset_ids": ["ds1"],
            "limit": 3,
            "similarity_threshold": 0.1,
            "model": "mistral-tiny"
        }))
        .unwrap();
        assert_eq!(req.retrieve.limit, 3);
        assert_eq!(req.model, "mistral-tiny");

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["query"], "Hello");
        assert_eq!(value["model"], "mistral-tiny");
    }
}
