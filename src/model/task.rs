use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Priority annotation: `TODO(high): ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Parse a raw priority token, falling back to the default for anything
    /// outside the vocabulary.
    pub fn parse_or_default(raw: Option<&str>) -> Priority {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid priority '{0}' (expected low, medium or high)")]
pub struct InvalidPriority(pub String);

impl FromStr for Priority {
    type Err = InvalidPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(InvalidPriority(s.to_string())),
        }
    }
}

/// Open/done state. Held in memory only, never written back to source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompletionState {
    #[default]
    Open,
    Done,
}

impl CompletionState {
    pub fn toggled(self) -> Self {
        match self {
            CompletionState::Open => CompletionState::Done,
            CompletionState::Done => CompletionState::Open,
        }
    }
}

/// Where an annotation lives: absolute file path and 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub path: PathBuf,
    pub line: usize,
}

impl Location {
    /// 0-based line index, as used by the source document.
    pub fn line_index(&self) -> usize {
        self.line.saturating_sub(1)
    }

    /// File name without directories, used for search and descriptions.
    pub fn basename(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// A single annotation found in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// `{path}-{line_index}-{offset}`; unique within one scan
    pub id: String,
    /// Free text after the tag, trimmed, comment closers removed
    pub text: String,
    /// Uppercased tag keyword
    pub tag: String,
    pub priority: Priority,
    pub pinned: bool,
    pub location: Location,
    /// Byte offset of the comment introducer within the line
    pub column: usize,
    pub state: CompletionState,
    pub created_at: DateTime<Utc>,
    /// Advisory suggestions, oldest first
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl TaskRecord {
    /// Build the identity string for an annotation at the given position.
    pub fn identity(path: &Path, line_index: usize, offset: usize) -> String {
        format!("{}-{}-{}", path.display(), line_index, offset)
    }

    pub fn is_done(&self) -> bool {
        self.state == CompletionState::Done
    }
}
