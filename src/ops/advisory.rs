//! Advisory suggestions for a task from a text-generation backend.
//!
//! The core only needs "prompt in, one suggestion out"; [`SuggestionSource`]
//! is that seam. [`OllamaAdvisor`] runs a local model through the `ollama`
//! CLI.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::io::source_file::{DocumentError, SourceDocument};
use crate::model::task::TaskRecord;

/// Errors from requesting a suggestion.
#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("suggestion backend not available: {message}")]
    Unavailable { message: String },
    #[error("model '{model}' is not installed (run: ollama pull {model})")]
    ModelNotFound { model: String },
    #[error("suggestion request timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
    #[error("suggestion backend failed: {message}")]
    Failed { message: String },
    #[error("suggestion backend returned nothing")]
    EmptyResponse,
    #[error("could not read task context: {0}")]
    Context(#[from] DocumentError),
}

/// Anything that can turn a prompt into a suggestion.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Run the prompt and return the raw response text.
    async fn suggest(&self, prompt: &str) -> Result<String, AdvisoryError>;
}

/// Up to `radius` lines on each side of the task line, as (1-based line
/// number, text) pairs.
pub fn context_lines(
    doc: &SourceDocument,
    record: &TaskRecord,
    radius: usize,
) -> Vec<(usize, String)> {
    let center = record.location.line_index();
    let first = center.saturating_sub(radius);
    let last = (center + radius).min(doc.line_count().saturating_sub(1));
    (first..=last)
        .filter_map(|idx| doc.line(idx).ok().map(|l| (idx + 1, l.to_string())))
        .collect()
}

/// The prompt sent for one task.
pub fn build_prompt(record: &TaskRecord, context: &[(usize, String)]) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are reviewing a code annotation left by a developer.\n");
    prompt.push_str("Suggest one concrete next step to resolve it. ");
    prompt.push_str("Answer in at most three sentences.\n\n");
    prompt.push_str(&format!("Type: {}\n", record.tag));
    prompt.push_str(&format!("Priority: {}\n", record.priority));
    prompt.push_str(&format!("Description: {}\n", record.text));
    prompt.push_str(&format!(
        "Location: {}:{}\n",
        record.location.path.display(),
        record.location.line
    ));
    if !context.is_empty() {
        prompt.push_str("\nSurrounding code:\n```\n");
        let width = context.last().map_or(1, |(n, _)| n.to_string().len());
        for (number, text) in context {
            let marker = if *number == record.location.line { '>' } else { ' ' };
            prompt.push_str(&format!("{marker}{number:>width$} | {text}\n"));
        }
        prompt.push_str("```\n");
    }
    prompt
}

/// Ask `source` about `record`, reading context from its file.
///
/// Returns the trimmed suggestion; an empty answer is an error.
pub async fn request_suggestion(
    source: &dyn SuggestionSource,
    record: &TaskRecord,
    radius: usize,
) -> Result<String, AdvisoryError> {
    let doc = SourceDocument::open(&record.location.path)?;
    let context = context_lines(&doc, record, radius);
    let prompt = build_prompt(record, &context);
    debug!(
        backend = source.name(),
        id = %record.id,
        "requesting suggestion ({} chars prompt)",
        prompt.len()
    );
    let answer = source.suggest(&prompt).await?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(AdvisoryError::EmptyResponse);
    }
    Ok(answer.to_string())
}

/// Local Ollama model, run via `ollama run <model>`.
#[derive(Debug, Clone)]
pub struct OllamaAdvisor {
    model: String,
    host: String,
    timeout_secs: u64,
}

impl OllamaAdvisor {
    /// Default request timeout (2 minutes for local inference).
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    pub fn new(model: &str, host: &str) -> Self {
        OllamaAdvisor {
            model: model.to_string(),
            host: host.to_string(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Map ollama's stderr onto our error kinds.
    fn classify_failure(&self, stderr: String) -> AdvisoryError {
        if stderr.contains("model") && stderr.contains("not found") {
            AdvisoryError::ModelNotFound {
                model: self.model.clone(),
            }
        } else if stderr.contains("connection refused") || stderr.contains("connect:") {
            AdvisoryError::Unavailable {
                message: format!("no server at {}", self.host),
            }
        } else {
            AdvisoryError::Failed { message: stderr }
        }
    }
}

#[async_trait]
impl SuggestionSource for OllamaAdvisor {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn suggest(&self, prompt: &str) -> Result<String, AdvisoryError> {
        let mut child = Command::new("ollama")
            .args(["run", &self.model])
            .env("OLLAMA_HOST", &self.host)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AdvisoryError::Unavailable {
                message: format!("could not start ollama: {e}"),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| AdvisoryError::Failed {
                    message: format!("could not write prompt: {e}"),
                })?;
            // Closing stdin ends the prompt
            drop(stdin);
        }

        let limit = Duration::from_secs(self.timeout_secs);
        let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(AdvisoryError::Failed {
                    message: format!("could not read output: {e}"),
                });
            }
            Err(_) => {
                return Err(AdvisoryError::Timeout {
                    timeout_secs: self.timeout_secs,
                });
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(self.classify_failure(String::from_utf8_lossy(&output.stderr).to_string()))
        }
    }
}
