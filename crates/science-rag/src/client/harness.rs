//! Smoke test of a running API
//!
//! Runs health, upload, parse, retrieve and generate in order against a
//! live deployment and stops at the first failing step.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::client::api::ApiClient;
use crate::error::{Error, Result};
use crate::types::{GenerateRequest, RetrieveRequest, UploadParams};

/// Parameters of a smoke run
#[derive(Debug, Clone)]
pub struct SmokeOptions {
    /// Every regular file directly inside this directory is uploaded
    pub data_dir: PathBuf,
    pub query: String,
    pub dataset_name: String,
    pub chunk_method: String,
    pub embedding_model: String,
    pub model: String,
    pub limit: usize,
    pub similarity_threshold: f32,
}

impl SmokeOptions {
    pub fn new(data_dir: impl Into<PathBuf>, query: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            query: query.into(),
            dataset_name: "test_API_small".to_string(),
            chunk_method: "naive".to_string(),
            embedding_model: "mistral-embed@Mistral".to_string(),
            model: "mistral-tiny".to_string(),
            limit: 3,
            similarity_threshold: 0.2,
        }
    }
}

/// Outcome of one step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
    pub elapsed: Duration,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<8} {:>7.2}s  {}",
            if self.passed { "PASS" } else { "FAIL" },
            self.name,
            self.elapsed.as_secs_f64(),
            self.detail
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct SmokeReport {
    pub steps: Vec<StepOutcome>,
    pub dataset_id: Option<String>,
}

impl SmokeReport {
    /// Whether every step ran and passed
    pub fn passed(&self) -> bool {
        self.steps.len() == STEPS && self.steps.iter().all(|s| s.passed)
    }

    fn record(&mut self, name: &'static str, start: Instant, result: Result<String>) -> bool {
        let (passed, detail) = match result {
            Ok(detail) => (true, detail),
            Err(e) => (false, e.to_string()),
        };
        let outcome = StepOutcome {
            name,
            passed,
            detail,
            elapsed: start.elapsed(),
        };

        if passed {
            tracing::info!("{}", outcome);
        } else {
            tracing::error!("{}", outcome);
        }
        self.steps.push(outcome);
        passed
    }
}

const STEPS: usize = 5;

/// Regular files directly inside `dir`, sorted by name
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Run the smoke sequence
pub async fn run_smoke(client: &ApiClient, options: &SmokeOptions) -> SmokeReport {
    let mut report = SmokeReport::default();

    let start = Instant::now();
    let health = client
        .health()
        .await
        .map(|h| format!("{} ({})", h.status, h.service));
    if !report.record("health", start, health) {
        return report;
    }

    let start = Instant::now();
    let upload = async {
        let files = collect_files(&options.data_dir)?;
        if files.is_empty() {
            return Err(Error::validation(format!(
                "no files in {}",
                options.data_dir.display()
            )));
        }
        let params = UploadParams {
            name: Some(options.dataset_name.clone()),
            chunk_method: Some(options.chunk_method.clone()),
            embedding_model: Some(options.embedding_model.clone()),
        };
        let response = client.upload_files(&files, &params).await?;
        if !response.is_success() {
            return Err(Error::Api {
                status: 200,
                message: format!("upload status '{}'", response.status),
            });
        }
        Ok((files.len(), response.dataset_id))
    }
    .await;
    let dataset_id = match upload {
        Ok((count, id)) => {
            report.dataset_id = Some(id.clone());
            report.record("upload", start, Ok(format!("{} files -> dataset {}", count, id)));
            id
        }
        Err(e) => {
            report.record("upload", start, Err(e));
            return report;
        }
    };

    let start = Instant::now();
    let parse = client.parse_documents(&dataset_id).await.and_then(|r| {
        if r.is_success() {
            Ok(r.status)
        } else {
            Err(Error::Api {
                status: 200,
                message: format!("parse status '{}'", r.status),
            })
        }
    });
    if !report.record("parse", start, parse) {
        return report;
    }

    let request = RetrieveRequest::new(options.query.clone(), vec![dataset_id])
        .with_limit(options.limit)
        .with_threshold(options.similarity_threshold);

    let start = Instant::now();
    let retrieve = client.retrieve(&request).await.map(|chunks| {
        let best = chunks
            .first()
            .and_then(|c| c.similarity)
            .map(|s| format!(", best similarity {:.3}", s))
            .unwrap_or_default();
        format!("{} chunks{}", chunks.len(), best)
    });
    if !report.record("retrieve", start, retrieve) {
        return report;
    }

    let start = Instant::now();
    let generate = client
        .generate(&GenerateRequest::new(request, options.model.clone()))
        .await
        .map(|r| format!("{} chars, sources {:?}", r.answer.chars().count(), r.sources));
    report.record("generate", start, generate);

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::testing::{spawn_api, MemoryDocumentService, StubLlm};

    async fn client() -> (ApiClient, crate::server::state::AppState) {
        let (base_url, state) =
            spawn_api(MemoryDocumentService::new(), StubLlm::answering("Hello back.")).await;
        let client = ApiClient::new(ClientConfig::default().with_base_url(base_url)).unwrap();
        (client, state)
    }

    #[tokio::test]
    async fn test_smoke_passes_against_healthy_api() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Hello world").unwrap();
        std::fs::write(dir.path().join("b.txt"), "Goodbye world").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), "ignored").unwrap();

        let (client, state) = client().await;
        let report = run_smoke(&client, &SmokeOptions::new(dir.path(), "Hello")).await;

        assert!(report.passed(), "{:?}", report.steps);
        assert_eq!(report.steps.len(), 5);
        assert!(report.steps[1].detail.starts_with("2 files"));
        assert!(report.steps[4].detail.contains("a.txt"));

        state.trigger_shutdown();
    }

    #[tokio::test]
    async fn test_smoke_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();

        let (client, state) = client().await;
        let report = run_smoke(&client, &SmokeOptions::new(dir.path(), "Hello")).await;

        assert!(!report.passed());
        assert_eq!(report.steps.len(), 2);
        assert!(report.steps[0].passed);
        assert!(!report.steps[1].passed);
        assert!(report.dataset_id.is_none());

        state.trigger_shutdown();
    }

    #[test]
    fn test_collect_files_is_shallow_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let files = collect_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md"]);
    }
}
