//! Console session state
//!
//! A session walks `Empty -> Uploaded -> Parsed` once. Answers are only
//! accepted after parsing and are kept in an append-only history until
//! the session is reset.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::types::{GenerateResponse, ParseResponse, UploadResponse};

/// File extensions the console accepts for upload
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt", "md", "pptx", "xlsx", "csv"];

/// Model used until the user picks another
pub const DEFAULT_MODEL: &str = "mistral-small-latest";

/// Retrieval settings sent with every question
pub const ASK_LIMIT: usize = 10;
pub const ASK_SIMILARITY_THRESHOLD: f32 = 0.1;

/// Length of a collapsed history entry's title
pub const HISTORY_TITLE_CHARS: usize = 50;

/// Whether `path` has one of [`ALLOWED_EXTENSIONS`]
pub fn is_allowed_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Dataset name used when the user gives none
pub fn default_dataset_name() -> String {
    format!("dataset_{}", Utc::now().timestamp())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Empty,
    Uploaded,
    Parsed,
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::Uploaded => "uploaded",
            Self::Parsed => "parsed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("cannot {action} while the session is {stage}")]
    OutOfOrder {
        action: &'static str,
        stage: SessionStage,
    },

    #[error("{action} returned status '{status}'")]
    Unsuccessful { action: &'static str, status: String },
}

/// Dataset created by this session
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetHandle {
    pub id: String,
    pub name: String,
    pub files: Vec<String>,
}

/// One answered question
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub query: String,
    pub answer: String,
    pub sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Session {
    stage: SessionStage,
    dataset: Option<DatasetHandle>,
    history: Vec<ChatTurn>,
    model: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            stage: SessionStage::Empty,
            dataset: None,
            history: Vec::new(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    pub fn dataset(&self) -> Option<&DatasetHandle> {
        self.dataset.as_ref()
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn can_upload(&self) -> bool {
        self.stage == SessionStage::Empty
    }

    pub fn can_parse(&self) -> bool {
        self.stage == SessionStage::Uploaded
    }

    pub fn can_ask(&self) -> bool {
        self.stage == SessionStage::Parsed
    }

    fn require(&self, stage: SessionStage, action: &'static str) -> Result<(), SessionError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(SessionError::OutOfOrder {
                action,
                stage: self.stage,
            })
        }
    }

    /// Accept an upload response; the session is unchanged unless it succeeded
    pub fn record_upload(
        &mut self,
        name: impl Into<String>,
        files: Vec<String>,
        response: &UploadResponse,
    ) -> Result<&DatasetHandle, SessionError> {
        self.require(SessionStage::Empty, "upload")?;
        if !response.is_success() {
            return Err(SessionError::Unsuccessful {
                action: "upload",
                status: response.status.clone(),
            });
        }

        self.stage = SessionStage::Uploaded;
        Ok(&*self.dataset.insert(DatasetHandle {
            id: response.dataset_id.clone(),
            name: name.into(),
            files,
        }))
    }

    pub fn record_parse(&mut self, response: &ParseResponse) -> Result<(), SessionError> {
        self.require(SessionStage::Uploaded, "parse")?;
        if !response.is_success() {
            return Err(SessionError::Unsuccessful {
                action: "parse",
                status: response.status.clone(),
            });
        }

        self.stage = SessionStage::Parsed;
        Ok(())
    }

    pub fn record_answer(
        &mut self,
        query: impl Into<String>,
        response: GenerateResponse,
    ) -> Result<&ChatTurn, SessionError> {
        self.require(SessionStage::Parsed, "ask")?;

        self.history.push(ChatTurn {
            query: query.into(),
            answer: response.answer,
            sources: response.sources,
            timestamp: Utc::now(),
        });
        Ok(&self.history[self.history.len() - 1])
    }

    /// Forget the dataset and history; the model choice is kept
    pub fn reset(&mut self) {
        self.stage = SessionStage::Empty;
        self.dataset = None;
        self.history.clear();
    }

    /// Render the history: the latest turn in full, earlier turns as titles
    pub fn render_history(&self) -> String {
        let last = self.history.len().saturating_sub(1);
        let mut out = String::new();

        for (i, turn) in self.history.iter().enumerate() {
            let title: String = turn.query.chars().take(HISTORY_TITLE_CHARS).collect();
            out.push_str(&format!("Question {}: {}...\n", i + 1, title));

            if i == last {
                out.push_str(&format!("  Question: {}\n", turn.query));
                out.push_str(&format!("  Answer: {}\n", turn.answer));
                if !turn.sources.is_empty() {
                    out.push_str("  Sources:\n");
                    for (j, source) in turn.sources.iter().enumerate() {
                        out.push_str(&format!("    {}. {}\n", j + 1, source));
                    }
                }
            }
        }
        out
    }
}
