//! Waiting for document parsing to finish
//!
//! The document service parses asynchronously. After submission the run
//! status of every submitted document is polled until all of them are
//! terminal, the deadline passes, or the process is asked to shut down.
//! In the last two cases the pending documents are cancelled.

use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

use crate::error::Result;
use crate::providers::DocumentServiceProvider;
use crate::types::{Document, RunStatus};

/// Polling parameters
#[derive(Debug, Clone, Copy)]
pub struct ParseWaitOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

/// Final state of one submitted document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentParseReport {
    pub id: String,
    pub name: String,
    pub status: RunStatus,
    pub chunk_count: u64,
    pub token_count: u64,
}

impl From<&Document> for DocumentParseReport {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            status: doc.run,
            chunk_count: doc.chunk_count,
            token_count: doc.token_count,
        }
    }
}

/// How a parse wait ended
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Every submitted document reached a terminal status
    Completed(Vec<DocumentParseReport>),
    /// Shutdown was requested; `cancelled` documents were still pending
    Interrupted { cancelled: Vec<String> },
    /// The deadline passed; `cancelled` documents were still pending
    TimedOut { cancelled: Vec<String> },
}

impl ParseOutcome {
    /// Reports of documents that did not end `DONE`
    pub fn failures(&self) -> Vec<&DocumentParseReport> {
        match self {
            Self::Completed(reports) => reports
                .iter()
                .filter(|r| r.status != RunStatus::Done)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Poll until every document in `document_ids` is terminal
pub async fn wait_for_parsing(
    service: &dyn DocumentServiceProvider,
    dataset_id: &str,
    document_ids: &[String],
    options: ParseWaitOptions,
    mut shutdown: watch::Receiver<bool>,
) -> Result<ParseOutcome> {
    let wanted: HashSet<&str> = document_ids.iter().map(String::as_str).collect();
    let deadline = Instant::now() + options.timeout;
    let mut pending: Vec<String>;

    loop {
        let documents = service.list_documents(dataset_id, None).await?;
        let tracked: Vec<&Document> = documents
            .iter()
            .filter(|d| wanted.contains(d.id.as_str()))
            .collect();

        pending = document_ids
            .iter()
            .filter(|id| {
                !tracked
                    .iter()
                    .any(|d| &d.id == *id && d.run.is_terminal())
            })
            .cloned()
            .collect();

        if pending.is_empty() {
            let reports = tracked.into_iter().map(DocumentParseReport::from).collect();
            return Ok(ParseOutcome::Completed(reports));
        }

        tracing::debug!(
            "Dataset {}: {}/{} documents still parsing",
            dataset_id,
            pending.len(),
            document_ids.len()
        );

        if *shutdown.borrow() {
            break;
        }

        let now = Instant::now();
        if now >= deadline {
            cancel_pending(service, dataset_id, &pending).await;
            return Ok(ParseOutcome::TimedOut { cancelled: pending });
        }

        let wait = options.poll_interval.min(deadline - now);
        tokio::select! {
            _ = sleep(wait) => {}
            changed = shutdown.changed() => {
                // a dropped sender means the server is going away too
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    cancel_pending(service, dataset_id, &pending).await;
    Ok(ParseOutcome::Interrupted { cancelled: pending })
}

async fn cancel_pending(service: &dyn DocumentServiceProvider, dataset_id: &str, pending: &[String]) {
    if pending.is_empty() {
        return;
    }
    if let Err(e) = service.stop_parsing(dataset_id, pending).await {
        tracing::warn!(
            "Failed to cancel parsing of {} documents in {}: {}",
            pending.len(),
            dataset_id,
            e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDocumentService;
    use crate::types::{DatasetSpec, UploadDocument};

    fn options() -> ParseWaitOptions {
        ParseWaitOptions {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_secs(5),
        }
    }

    async fn dataset_with(service: &MemoryDocumentService, files: &[(&str, &str)]) -> (String, Vec<String>) {
        let dataset = service
            .create_dataset(&DatasetSpec {
                name: "t".into(),
                embedding_model: "m".into(),
                chunk_method: "naive".into(),
            })
            .await
            .unwrap();
        let uploads: Vec<UploadDocument> = files
            .iter()
            .map(|(name, body)| UploadDocument {
                display_name: name.to_string(),
                blob: body.as_bytes().to_vec(),
            })
            .collect();
        let docs = service.upload_documents(&dataset.id, &uploads).await.unwrap();
        (dataset.id, docs.into_iter().map(|d| d.id).collect())
    }

    #[tokio::test]
    async fn test_completes_after_polling() {
        let service = MemoryDocumentService::new().with_parse_polls(2);
        let (dataset_id, ids) = dataset_with(&service, &[("a.txt", "Hello world")]).await;
        service.start_parsing(&dataset_id, &ids).await.unwrap();

        let (_tx, rx) = watch::channel(false);
        let outcome = wait_for_parsing(&service, &dataset_id, &ids, options(), rx)
            .await
            .unwrap();

        match &outcome {
            ParseOutcome::Completed(reports) => {
                assert_eq!(reports.len(), 1);
                assert_eq!(reports[0].status, RunStatus::Done);
                assert_eq!(reports[0].chunk_count, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(outcome.failures().is_empty());
    }

    #[tokio::test]
    async fn test_failed_documents_are_reported() {
        let service = MemoryDocumentService::new().failing_on("b.txt");
        let (dataset_id, ids) =
            dataset_with(&service, &[("a.txt", "Hello"), ("b.txt", "broken")]).await;
        service.start_parsing(&dataset_id, &ids).await.unwrap();

        let (_tx, rx) = watch::channel(false);
        let outcome = wait_for_parsing(&service, &dataset_id, &ids, options(), rx)
            .await
            .unwrap();

        let failures = outcome.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "b.txt");
        assert_eq!(failures[0].status, RunStatus::Fail);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending() {
        let service = MemoryDocumentService::new().never_finishing();
        let (dataset_id, ids) = dataset_with(&service, &[("a.txt", "Hello")]).await;
        service.start_parsing(&dataset_id, &ids).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let trigger = async {
            sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
        };
        let (outcome, _) = tokio::join!(
            wait_for_parsing(&service, &dataset_id, &ids, options(), rx),
            trigger
        );

        assert_eq!(
            outcome.unwrap(),
            ParseOutcome::Interrupted { cancelled: ids.clone() }
        );
        assert_eq!(service.stopped(), ids);
    }

    #[tokio::test]
    async fn test_deadline_cancels_pending() {
        let service = MemoryDocumentService::new().never_finishing();
        let (dataset_id, ids) = dataset_with(&service, &[("a.txt", "Hello")]).await;
        service.start_parsing(&dataset_id, &ids).await.unwrap();

        let (_tx, rx) = watch::channel(false);
        let short = ParseWaitOptions {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(30),
        };
        let outcome = wait_for_parsing(&service, &dataset_id, &ids, short, rx)
            .await
            .unwrap();

        assert!(matches!(outcome, ParseOutcome::TimedOut { ref cancelled } if cancelled == &ids));
        assert_eq!(service.stopped(), ids);
    }
}
