use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::io::scanner::{self, Exclusions};
use crate::model::config::Settings;
use crate::model::task::{Priority, TaskRecord};
use crate::ops::advisory::{self, AdvisoryError, SuggestionSource};
use crate::ops::edit_ops::{self, EditError, EditOutcome};
use crate::ops::repository::TaskRepository;
use crate::ops::view::{self, ViewFilter, ViewNode};
use crate::parse::AnnotationGrammar;

/// Result of a metadata edit on one task.
#[derive(Debug)]
pub enum EditReport {
    /// Source rewritten, record updated
    Written,
    /// Source already matched, record updated if it had drifted
    Unchanged,
    /// Source could not be rewritten; the record was updated anyway and may
    /// now disagree with the comment on disk
    SourceStale { error: EditError },
    /// No record with that identity in the current scan
    NotFound,
}

impl From<Result<EditOutcome, EditError>> for EditReport {
    fn from(result: Result<EditOutcome, EditError>) -> Self {
        match result {
            Ok(EditOutcome::Written) => EditReport::Written,
            Ok(EditOutcome::Unchanged) => EditReport::Unchanged,
            Err(error) => EditReport::SourceStale { error },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error(transparent)]
    Advisory(#[from] AdvisoryError),
}

/// One workspace: its settings, grammar, task set and active filters.
#[derive(Debug)]
pub struct Session {
    root: PathBuf,
    settings: Settings,
    grammar: Arc<AnnotationGrammar>,
    exclusions: Exclusions,
    repo: TaskRepository,
    filter: ViewFilter,
}

impl Session {
    pub fn new(root: &Path, settings: Settings) -> Self {
        let grammar = Arc::new(AnnotationGrammar::new(&settings.tags()));
        let exclusions = Exclusions::new(&settings.exclusion_globs());
        Session {
            root: root.to_path_buf(),
            settings,
            grammar,
            exclusions,
            repo: TaskRepository::new(),
            filter: ViewFilter::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn grammar(&self) -> &AnnotationGrammar {
        &self.grammar
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    pub fn repository(&self) -> &TaskRepository {
        &self.repo
    }

    pub fn repository_mut(&mut self) -> &mut TaskRepository {
        &mut self.repo
    }

    pub fn filter(&self) -> &ViewFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: ViewFilter) {
        self.filter = filter;
    }

    /// Scan the workspace and replace the task set. Returns the number of
    /// records now held.
    pub async fn rescan(&mut self) -> usize {
        let ticket = self.repo.begin_scan();
        let grammar = Arc::clone(&self.grammar);
        let records = scanner::scan_workspace(&self.root, grammar, &self.exclusions).await;
        if self.repo.complete_scan(ticket, records) {
            info!("found {} annotations", self.repo.len());
        }
        self.repo.len()
    }

    /// The filtered, grouped view of the current task set.
    pub fn tree(&self) -> Vec<ViewNode<'_>> {
        view::project(self.repo.all(), &self.filter, Some(&self.root))
    }

    /// Look a task up by identity, or by `path:line` (path relative to the
    /// root or absolute; first annotation on the line).
    pub fn find(&self, reference: &str) -> Option<&TaskRecord> {
        if let Some(record) = self.repo.get(reference) {
            return Some(record);
        }
        let (path, line) = reference.rsplit_once(':')?;
        let line: usize = line.parse().ok()?;
        let path = Path::new(path);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        self.repo
            .all()
            .iter()
            .filter(|r| r.location.path == path && r.location.line == line)
            .min_by_key(|r| r.column)
    }

    /// Set or clear a task's priority in its source line and in memory.
    pub fn set_priority(&mut self, id: &str, priority: Option<Priority>) -> EditReport {
        let Some(record) = self.repo.get(id).cloned() else {
            return EditReport::NotFound;
        };
        let result = edit_ops::rewrite_priority(&self.grammar, &record, priority);
        if let Err(e) = &result {
            warn!(id, "could not rewrite priority: {e}");
        }
        let updated = TaskRecord {
            priority: priority.unwrap_or_default(),
            ..record.clone()
        };
        if updated != record {
            self.repo.upsert_by_identity(updated);
        }
        result.into()
    }

    /// Toggle a task's pin marker in its source line and in memory.
    pub fn toggle_pin(&mut self, id: &str) -> EditReport {
        let Some(record) = self.repo.get(id).cloned() else {
            return EditReport::NotFound;
        };
        let result = edit_ops::rewrite_pin(&self.grammar, &record);
        if let Err(e) = &result {
            warn!(id, "could not toggle pin: {e}");
        }
        let pinned = !record.pinned;
        self.repo.upsert_by_identity(TaskRecord { pinned, ..record });
        result.into()
    }

    /// Flip open/done. In memory only. Returns `false` for unknown ids.
    pub fn toggle_done(&mut self, id: &str) -> bool {
        let Some(record) = self.repo.get(id).cloned() else {
            return false;
        };
        let state = record.state.toggled();
        self.repo.upsert_by_identity(TaskRecord { state, ..record })
    }

    /// Ask `source` for a suggestion and append it to the task.
    pub async fn suggest(
        &mut self,
        id: &str,
        source: &dyn SuggestionSource,
    ) -> Result<String, SessionError> {
        let record = self
            .repo
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::TaskNotFound(id.to_string()))?;
        let radius = self.settings.context_lines;
        let suggestion = advisory::request_suggestion(source, &record, radius).await?;

        // The task set may have been replaced while we waited
        if let Some(current) = self.repo.get(id).cloned() {
            let mut suggestions = current.suggestions.clone();
            suggestions.push(suggestion.clone());
            self.repo.upsert_by_identity(TaskRecord { suggestions, ..current });
        }
        Ok(suggestion)
    }
}
