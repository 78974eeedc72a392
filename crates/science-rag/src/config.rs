//! Configuration for the orchestration API and its clients

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "SCIENCE_RAG_CONFIG";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// External document service (RAGFlow-compatible)
    pub document_service: DocumentServiceConfig,
    /// External completion service (OpenAI-compatible)
    pub llm: LlmConfig,
    /// Defaults applied to dataset creation
    pub defaults: DatasetDefaults,
}

impl RagConfig {
    /// Load configuration: defaults, then an optional TOML file, then the
    /// process environment.
    ///
    /// The file is taken from `path` when given, else from
    /// `SCIENCE_RAG_CONFIG`, else `<config dir>/science-rag/config.toml`
    /// when that file exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .or_else(|| {
                dirs::config_dir()
                    .map(|dir| dir.join("science-rag").join("config.toml"))
                    .filter(|p| p.is_file())
            });

        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                tracing::info!("Loaded configuration from {}", path.display());
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing sections keep their defaults
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply environment-style overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup("RAGFLOW_API_KEY") {
            self.document_service.api_key = key;
        }
        if let Some(url) = lookup("RAGFLOW_BASE_URL") {
            self.document_service.base_url = url;
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(key) = lookup("LLM_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.default_model = model;
        }
        if let Some(host) = lookup("SCIENCE_RAG_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SCIENCE_RAG_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid SCIENCE_RAG_PORT: {}", port),
            }
        }
    }

    /// Reject configurations the server cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.document_service.base_url.trim().is_empty() {
            return Err(Error::Config("document service base URL is empty (RAGFLOW_BASE_URL)".into()));
        }
        if self.document_service.api_key.trim().is_empty() {
            return Err(Error::Config("document service API key is empty (RAGFLOW_API_KEY)".into()));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(Error::Config("completion service base URL is empty (LLM_BASE_URL)".into()));
        }
        if self.document_service.parse_poll_interval_ms == 0 {
            return Err(Error::Config("parse_poll_interval_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8025,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Document service (RAGFlow) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentServiceConfig {
    /// Base URL, e.g. `http://localhost:9380`
    pub base_url: String,
    /// Bearer API key
    pub api_key: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Delay between parse status polls
    pub parse_poll_interval_ms: u64,
    /// Give up waiting for parsing after this many seconds
    pub parse_timeout_secs: u64,
    /// Candidate pool size handed to the similarity search
    pub retrieval_top_k: usize,
}

impl Default for DocumentServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9380".to_string(),
            api_key: String::new(),
            timeout_secs: 120,
            parse_poll_interval_ms: 1000,
            parse_timeout_secs: 1800,
            retrieval_top_k: 1024,
        }
    }
}

impl DocumentServiceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.parse_poll_interval_ms)
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_timeout_secs)
    }
}

/// Completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (the part before `/chat/completions`)
    pub base_url: String,
    /// Optional bearer API key
    pub api_key: Option<String>,
    /// Model used when a request does not name one
    pub default_model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mistral.ai/v1".to_string(),
            api_key: None,
            default_model: "mistral-small-latest".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Defaults for `POST /upload-dataset/`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetDefaults {
    pub name: String,
    pub chunk_method: String,
    pub embedding_model: String,
}

impl Default for DatasetDefaults {
    fn default() -> Self {
        Self {
            name: "test_dataset".to_string(),
            chunk_method: "naive".to_string(),
            embedding_model: "mistral-embed@Mistral".to_string(),
        }
    }
}

/// Configuration for the API client used by the console and smoke harness
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Orchestration API base URL
    pub api_base_url: String,
    pub upload_timeout_secs: u64,
    pub parse_timeout_secs: u64,
    pub generate_timeout_secs: u64,
    pub health_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8025".to_string(),
            upload_timeout_secs: 30,
            parse_timeout_secs: 30,
            generate_timeout_secs: 60,
            health_timeout_secs: 5,
        }
    }
}

impl ClientConfig {
    /// Point the client at another API instance
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}
