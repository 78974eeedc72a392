//! In-memory doubles of the external services, for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::RagConfig;

use crate::error::{Error, Result};
use crate::providers::{DocumentServiceProvider, LlmProvider};
use crate::server::{state::AppState, RagServer};
use crate::types::{
    Dataset, DatasetSpec, Document, RetrievalQuery, RetrievedChunk, RunStatus, UploadDocument,
};

struct StoredDocument {
    doc: Document,
    content: String,
    /// Status polls left before a running parse settles
    polls_left: u32,
}

struct StoredDataset {
    dataset: Dataset,
    documents: Vec<StoredDocument>,
}

#[derive(Default)]
struct State {
    datasets: BTreeMap<String, StoredDataset>,
    next_id: u64,
    submitted: Vec<Vec<String>>,
    stopped: Vec<String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }
}

/// Document service keeping datasets in memory.
///
/// Parsing turns a whole document into one chunk. Similarity is 1.0 for
/// an exact match and otherwise 0.9 times the share of query words found
/// in the chunk, so any threshold of 1.0 rejects non-identical queries.
pub struct MemoryDocumentService {
    state: Mutex<State>,
    parse_polls: u32,
    never_finish: bool,
    failing: HashSet<String>,
    canned: Option<Vec<RetrievedChunk>>,
}

impl MemoryDocumentService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            parse_polls: 0,
            never_finish: false,
            failing: HashSet::new(),
            canned: None,
        }
    }

    /// Require `polls` status listings before a started parse settles
    pub fn with_parse_polls(mut self, polls: u32) -> Self {
        self.parse_polls = polls;
        self
    }

    /// Documents with this display name end parsing as `FAIL`
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Started parses stay `RUNNING` until stopped
    pub fn never_finishing(mut self) -> Self {
        self.never_finish = true;
        self
    }

    /// Retrieval answers with these chunks, whatever the query
    pub fn returning_chunks(mut self, chunks: Vec<RetrievedChunk>) -> Self {
        self.canned = Some(chunks);
        self
    }

    /// Document ids of every `start_parsing` call, in order
    pub fn submitted(&self) -> Vec<Vec<String>> {
        self.state.lock().submitted.clone()
    }

    /// Document ids passed to `stop_parsing`
    pub fn stopped(&self) -> Vec<String> {
        self.state.lock().stopped.clone()
    }

    fn settle(&self, stored: &mut StoredDocument) {
        if stored.doc.run != RunStatus::Running || self.never_finish {
            return;
        }
        if stored.polls_left > 0 {
            stored.polls_left -= 1;
            return;
        }
        if self.failing.contains(&stored.doc.name) {
            stored.doc.run = RunStatus::Fail;
        } else {
            stored.doc.run = RunStatus::Done;
            stored.doc.chunk_count = 1;
            stored.doc.token_count = stored.content.split_whitespace().count() as u64;
        }
    }
}

impl Default for MemoryDocumentService {
    fn default() -> Self {
        Self::new()
    }
}

fn similarity(query: &str, content: &str) -> f32 {
    if query.trim() == content.trim() {
        return 1.0;
    }
    let words: Vec<String> = query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let haystack = content.to_lowercase();
    let hits = words.iter().filter(|w| haystack.contains(w.as_str())).count();
    0.9 * hits as f32 / words.len() as f32
}

#[async_trait]
impl DocumentServiceProvider for MemoryDocumentService {
    async fn create_dataset(&self, spec: &DatasetSpec) -> Result<Dataset> {
        let mut state = self.state.lock();
        let id = state.next_id("ds");
        let dataset = Dataset {
            id: id.clone(),
            name: spec.name.clone(),
            embedding_model: spec.embedding_model.clone(),
            chunk_method: spec.chunk_method.clone(),
        };
        state.datasets.insert(
            id,
            StoredDataset {
                dataset: dataset.clone(),
                documents: Vec::new(),
            },
        );
        Ok(dataset)
    }

    async fn get_dataset(&self, dataset_id: &str) -> Result<Dataset> {
        self.state
            .lock()
            .datasets
            .get(dataset_id)
            .map(|d| d.dataset.clone())
            .ok_or_else(|| Error::DatasetNotFound(dataset_id.to_string()))
    }

    async fn upload_documents(
        &self,
        dataset_id: &str,
        documents: &[UploadDocument],
    ) -> Result<Vec<Document>> {
        let mut state = self.state.lock();
        let ids: Vec<String> = documents.iter().map(|_| state.next_id("doc")).collect();
        let dataset = state
            .datasets
            .get_mut(dataset_id)
            .ok_or_else(|| Error::DatasetNotFound(dataset_id.to_string()))?;

        let mut created = Vec::new();
        for (upload, id) in documents.iter().zip(ids) {
            let doc = Document {
                id,
                name: upload.display_name.clone(),
                dataset_id: Some(dataset_id.to_string()),
                run: RunStatus::Unstart,
                chunk_count: 0,
                token_count: 0,
            };
            created.push(doc.clone());
            dataset.documents.push(StoredDocument {
                doc,
                content: String::from_utf8_lossy(&upload.blob).into_owned(),
                polls_left: 0,
            });
        }
        Ok(created)
    }

    async fn list_documents(
        &self,
        dataset_id: &str,
        document_id: Option<&str>,
    ) -> Result<Vec<Document>> {
        let mut state = self.state.lock();
        let dataset = state
            .datasets
            .get_mut(dataset_id)
            .ok_or_else(|| Error::DatasetNotFound(dataset_id.to_string()))?;

        let mut listed = Vec::new();
        for stored in dataset.documents.iter_mut() {
            self.settle(stored);
            if document_id.map_or(true, |id| id == stored.doc.id) {
                listed.push(stored.doc.clone());
            }
        }
        Ok(listed)
    }

    async fn start_parsing(&self, dataset_id: &str, document_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        state.submitted.push(document_ids.to_vec());
        let polls = self.parse_polls;
        let dataset = state
            .datasets
            .get_mut(dataset_id)
            .ok_or_else(|| Error::DatasetNotFound(dataset_id.to_string()))?;

        for stored in dataset.documents.iter_mut() {
            if document_ids.contains(&stored.doc.id) {
                stored.doc.run = RunStatus::Running;
                stored.polls_left = polls;
            }
        }
        Ok(())
    }

    async fn stop_parsing(&self, dataset_id: &str, document_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        state.stopped.extend(document_ids.iter().cloned());
        if let Some(dataset) = state.datasets.get_mut(dataset_id) {
            for stored in dataset.documents.iter_mut() {
                if document_ids.contains(&stored.doc.id) && stored.doc.run == RunStatus::Running {
                    stored.doc.run = RunStatus::Cancel;
                }
            }
        }
        Ok(())
    }

    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievedChunk>> {
        if let Some(canned) = &self.canned {
            return Ok(canned.iter().take(query.limit).cloned().collect());
        }

        let state = self.state.lock();
        let mut scored = Vec::new();

        for dataset_id in &query.dataset_ids {
            let dataset = state
                .datasets
                .get(dataset_id)
                .ok_or_else(|| Error::DatasetNotFound(dataset_id.clone()))?;

            for stored in dataset.documents.iter().filter(|s| s.doc.run == RunStatus::Done) {
                let score = similarity(&query.question, &stored.content);
                if score >= query.similarity_threshold {
                    let mut chunk = RetrievedChunk::new(stored.doc.id.clone(), stored.content.clone());
                    chunk.id = Some(format!("{}-0", stored.doc.id));
                    chunk.dataset_id = Some(dataset_id.clone());
                    chunk.similarity = Some(f64::from(score));
                    scored.push(chunk);
                }
            }
        }

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(query.limit);
        Ok(scored)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Completion double that echoes a fixed answer and records prompts
pub struct StubLlm {
    answer: Option<String>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl StubLlm {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every completion fails
    pub fn unavailable() -> Self {
        Self {
            answer: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// `(model, prompt)` pairs received so far
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .push((model.to_string(), prompt.to_string()));
        self.answer
            .clone()
            .ok_or_else(|| Error::llm("completion service unavailable"))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.answer.is_some())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Serve the API on an ephemeral local port over the given doubles.
///
/// Returns the base URL and the state, whose `trigger_shutdown` stops the
/// server.
pub async fn spawn_api(documents: MemoryDocumentService, llm: StubLlm) -> (String, AppState) {
    let mut config = RagConfig::default();
    config.document_service.parse_poll_interval_ms = 5;

    let documents: Arc<dyn DocumentServiceProvider> = Arc::new(documents);
    let llm: Arc<dyn LlmProvider> = Arc::new(llm);
    let state = AppState::with_providers(config, documents, llm);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(RagServer::with_state(state.clone()).serve(listener));

    (format!("http://{}", addr), state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_scale() {
        assert_eq!(similarity("Hello world", "Hello world"), 1.0);
        assert!((similarity("Hello", "Hello world") - 0.9).abs() < 1e-6);
        assert_eq!(similarity("Hello", "Goodbye world"), 0.0);
        assert!(similarity("Hello there", "Hello world") < 1.0);
    }
}
