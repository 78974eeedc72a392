//! Interactive console for the orchestration API

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::client::api::ApiClient;
use crate::client::harness::collect_files;
use crate::client::session::{
    default_dataset_name, is_allowed_file, Session, SessionStage, ASK_LIMIT,
    ASK_SIMILARITY_THRESHOLD, DEFAULT_MODEL,
};
use crate::error::{Error, Result};
use crate::types::{GenerateRequest, RetrieveRequest, UploadParams};

const HELP: &str = "\
Commands:
  name <dataset name>    Name for the next upload (default dataset_<unix time>)
  upload <path>...       Upload files, or every file directly inside a directory
  parse                  Parse the uploaded dataset
  ask <question>         Answer a question from the parsed dataset
  history                Show previous answers
  model <name>           Completion model (default mistral-small-latest)
  status                 Show the session state
  reset                  Start over with a new dataset
  help                   Show this help
  quit                   Leave";

/// One console command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Name(String),
    Upload(Vec<PathBuf>),
    Parse,
    Ask(String),
    History,
    Model(String),
    Status,
    Reset,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line; `None` for a blank line
    pub fn parse(line: &str) -> std::result::Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let need = |what: &str| {
            if rest.is_empty() {
                Err(format!("'{}' needs {}", word, what))
            } else {
                Ok(rest.to_string())
            }
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "name" => Self::Name(need("a dataset name")?),
            "upload" => {
                need("at least one path")?;
                Self::Upload(rest.split_whitespace().map(PathBuf::from).collect())
            }
            "parse" => Self::Parse,
            "ask" => Self::Ask(need("a question")?),
            "history" => Self::History,
            "model" => Self::Model(need("a model name")?),
            "status" => Self::Status,
            "reset" => Self::Reset,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

/// Expand directories one level and keep only uploadable files.
///
/// Returns the accepted files and the skipped paths.
pub fn select_uploads(paths: &[PathBuf]) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut accepted = Vec::new();
    let mut skipped = Vec::new();

    for path in paths {
        let candidates = if path.is_dir() {
            collect_files(path)?
        } else {
            vec![path.clone()]
        };
        for candidate in candidates {
            if candidate.is_file() && is_allowed_file(&candidate) {
                accepted.push(candidate);
            } else {
                skipped.push(candidate);
            }
        }
    }
    Ok((accepted, skipped))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub struct Console {
    client: ApiClient,
    session: Session,
    dataset_name: Option<String>,
    term: Term,
}

impl Console {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            session: Session::new(),
            dataset_name: None,
            term: Term::stdout(),
        }
    }

    /// Check the API is up, then read commands from stdin until `quit` or EOF
    pub async fn run(mut self) -> Result<()> {
        let health = self.client.health().await.map_err(|e| {
            Error::Config(format!(
                "API at {} is not reachable: {}",
                self.client.base_url(),
                e
            ))
        })?;

        self.say(format!(
            "{} {} at {} ({})",
            style("Connected to").green(),
            health.service,
            self.client.base_url(),
            health.status
        ));
        self.say(format!("Model: {}. Type 'help' for commands.", DEFAULT_MODEL));

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let prompt = format!("{} ", style(format!("[{}]>", self.session.stage())).cyan());
            if let Err(e) = self.term.write_str(&prompt) {
                tracing::debug!("Failed to write prompt: {}", e);
            }

            let Some(line) = lines.next_line().await? else {
                break;
            };
            match Command::parse(&line) {
                Ok(None) => {}
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => self.execute(command).await,
                Err(message) => self.warn(message),
            }
        }
        Ok(())
    }

    async fn execute(&mut self, command: Command) {
        match command {
            Command::Name(name) => {
                self.say(format!("Next dataset will be named '{}'", name));
                self.dataset_name = Some(name);
            }
            Command::Upload(paths) => self.upload(&paths).await,
            Command::Parse => self.parse().await,
            Command::Ask(question) => self.ask(question).await,
            Command::History => {
                if self.session.history().is_empty() {
                    self.say("No questions asked yet");
                } else {
                    self.say(self.session.render_history().trim_end().to_string());
                }
            }
            Command::Model(model) => {
                self.say(format!("Using model {}", model));
                self.session.set_model(model);
            }
            Command::Status => self.status(),
            Command::Reset => {
                self.session.reset();
                self.dataset_name = None;
                self.say("Session reset");
            }
            Command::Help => self.say(HELP),
            Command::Quit => {}
        }
    }

    async fn upload(&mut self, paths: &[PathBuf]) {
        if !self.session.can_upload() {
            self.warn("A dataset is already uploaded; 'reset' to start over");
            return;
        }

        let (files, skipped) = match select_uploads(paths) {
            Ok(selected) => selected,
            Err(e) => return self.fail(e),
        };
        for path in &skipped {
            self.warn(format!("Skipping {} (unsupported file)", path.display()));
        }
        if files.is_empty() {
            self.warn("Nothing to upload");
            return;
        }

        let name = self.dataset_name.clone().unwrap_or_else(default_dataset_name);
        let params = UploadParams {
            name: Some(name.clone()),
            ..Default::default()
        };
        let message = format!("Uploading {} files to '{}'...", files.len(), name);
        let result = spin(message, self.client.upload_files(&files, &params)).await;

        match result {
            Ok(response) => {
                let names = files.iter().map(|p| file_name(p)).collect();
                match self.session.record_upload(name, names, &response) {
                    Ok(dataset) => {
                        let line = format!("Uploaded to dataset {}", dataset.id);
                        self.ok(line);
                    }
                    Err(e) => self.warn(e.to_string()),
                }
            }
            Err(e) => self.fail(e),
        }
    }

    async fn parse(&mut self) {
        let Some(dataset_id) = self.ready_dataset(SessionStage::Uploaded) else {
            return;
        };

        let result = spin(
            "Parsing documents, this can take a while...".to_string(),
            self.client.parse_documents(&dataset_id),
        )
        .await;

        match result {
            Ok(response) => match self.session.record_parse(&response) {
                Ok(()) => self.ok("Documents parsed"),
                Err(e) => self.warn(e.to_string()),
            },
            Err(e) => self.fail(e),
        }
    }

    async fn ask(&mut self, question: String) {
        let Some(dataset_id) = self.ready_dataset(SessionStage::Parsed) else {
            return;
        };

        let request = GenerateRequest::new(
            RetrieveRequest::new(question.clone(), vec![dataset_id])
                .with_limit(ASK_LIMIT)
                .with_threshold(ASK_SIMILARITY_THRESHOLD),
            self.session.model().to_string(),
        );
        let result = spin(
            "Searching the documents...".to_string(),
            self.client.generate(&request),
        )
        .await;

        match result {
            Ok(response) => match self.session.record_answer(question, response) {
                Ok(turn) => {
                    let mut out = format!("{}\n{}", style("Answer:").bold(), turn.answer);
                    if !turn.sources.is_empty() {
                        out.push_str(&format!("\n{}", style("Sources:").bold()));
                        for (i, source) in turn.sources.iter().enumerate() {
                            out.push_str(&format!("\n  {}. {}", i + 1, source));
                        }
                    }
                    self.say(out);
                }
                Err(e) => self.warn(e.to_string()),
            },
            Err(e) => self.fail(e),
        }
    }

    /// Dataset id when the session is at `stage`, else a hint
    fn ready_dataset(&self, stage: SessionStage) -> Option<String> {
        if self.session.stage() == stage {
            return self.session.dataset().map(|d| d.id.clone());
        }
        let hint = match self.session.stage() {
            SessionStage::Empty => "Upload documents first",
            SessionStage::Uploaded => "Parse the documents first",
            SessionStage::Parsed => "Documents are already parsed; 'ask' a question",
        };
        self.warn(hint);
        None
    }

    fn status(&self) {
        let mut out = format!(
            "Stage: {}\nModel: {}\nAPI: {}",
            self.session.stage(),
            self.session.model(),
            self.client.base_url()
        );
        if let Some(dataset) = self.session.dataset() {
            out.push_str(&format!(
                "\nDataset: {} ({})\nFiles: {}",
                dataset.name,
                dataset.id,
                dataset.files.join(", ")
            ));
        }
        out.push_str(&format!("\nAnswers: {}", self.session.history().len()));
        self.say(out);
    }

    fn say(&self, message: impl AsRef<str>) {
        if let Err(e) = self.term.write_line(message.as_ref()) {
            tracing::debug!("Failed to write to terminal: {}", e);
        }
    }

    fn ok(&self, message: impl AsRef<str>) {
        self.say(format!("{} {}", style("✓").green(), message.as_ref()));
    }

    fn warn(&self, message: impl AsRef<str>) {
        self.say(format!("{} {}", style("!").yellow(), message.as_ref()));
    }

    fn fail(&self, error: Error) {
        self.say(format!("{} {}", style("✗").red(), error));
    }
}

/// Show a spinner while `future` runs
async fn spin<F: Future>(message: String, future: F) -> F::Output {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));

    let output = future.await;
    spinner.finish_and_clear();
    output
}
