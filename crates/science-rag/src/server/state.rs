//! Application state for the orchestration server

use std::sync::Arc;
use tokio::sync::watch;

use crate::config::RagConfig;
use crate::error::Result;
use crate::providers::{DocumentServiceProvider, LlmProvider, OpenAiCompatClient, RagflowClient};

/// Shared application state.
///
/// Built once at startup and read-only afterwards; handlers receive a
/// cheap clone through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// External document service
    documents: Arc<dyn DocumentServiceProvider>,
    /// External completion service
    llm: Arc<dyn LlmProvider>,
    /// Flipped to `true` once the process is asked to stop
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Create state with the HTTP clients described by `config`
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let documents = RagflowClient::new(&config.document_service)?;
        tracing::info!(
            "Document service client ready ({} at {})",
            documents.name(),
            config.document_service.base_url
        );

        let llm = OpenAiCompatClient::new(&config.llm)?;
        tracing::info!(
            "Completion client ready ({} at {}, default model {})",
            llm.name(),
            config.llm.base_url,
            config.llm.default_model
        );

        Ok(Self::with_providers(config, Arc::new(documents), Arc::new(llm)))
    }

    /// Create state around existing providers
    pub fn with_providers(
        config: RagConfig,
        documents: Arc<dyn DocumentServiceProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                documents,
                llm,
                shutdown,
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the document service
    pub fn documents(&self) -> &dyn DocumentServiceProvider {
        self.inner.documents.as_ref()
    }

    /// Get the completion service
    pub fn llm(&self) -> &dyn LlmProvider {
        self.inner.llm.as_ref()
    }

    /// Subscribe to the shutdown signal
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Ask in-flight work to wind down
    pub fn trigger_shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }
}
