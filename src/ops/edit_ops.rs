use tracing::debug;

use crate::io::source_file::{DocumentError, SourceDocument};
use crate::model::task::{Priority, TaskRecord};
use crate::parse::{AnnotationGrammar, LineEdit, RewriteError, line_rewriter};

/// What happened to the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The line was rewritten and the file saved
    Written,
    /// The line already said what was asked; nothing was written
    Unchanged,
}

/// Error type for source rewrites
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("{path}:{line}: {source}")]
    Rewrite {
        path: String,
        line: usize,
        source: RewriteError,
    },
}

/// Load the record's line, run `rewrite` on it, and save the file if the
/// line changed.
fn apply<F>(record: &TaskRecord, rewrite: F) -> Result<EditOutcome, EditError>
where
    F: FnOnce(&str) -> Result<LineEdit, RewriteError>,
{
    let mut doc = SourceDocument::open(&record.location.path)?;
    let idx = record.location.line_index();
    let edit = rewrite(doc.line(idx)?).map_err(|e| EditError::Rewrite {
        path: record.location.path.display().to_string(),
        line: record.location.line,
        source: e,
    })?;

    match edit {
        LineEdit::Unchanged => Ok(EditOutcome::Unchanged),
        LineEdit::Changed(updated) => {
            debug!(id = %record.id, "rewriting line {}: {}", record.location.line, updated.trim());
            doc.replace_line(idx, &updated)?;
            doc.save()?;
            Ok(EditOutcome::Written)
        }
    }
}

/// Write a new priority (or clear it with `None`) into the record's source line.
pub fn rewrite_priority(
    grammar: &AnnotationGrammar,
    record: &TaskRecord,
    priority: Option<Priority>,
) -> Result<EditOutcome, EditError> {
    apply(record, |line| {
        line_rewriter::set_priority(grammar, line, &record.tag, record.column, priority)
    })
}

/// Flip the pin marker in the record's source line.
pub fn rewrite_pin(
    grammar: &AnnotationGrammar,
    record: &TaskRecord,
) -> Result<EditOutcome, EditError> {
    apply(record, |line| line_rewriter::toggle_pin(grammar, line, &record.tag, record.column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_records;
    use chrono::Utc;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn setup(content: &str) -> (TempDir, std::path::PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("main.rs");
        fs::write(&path, content).unwrap();
        (tmp, path)
    }

    fn first_record(grammar: &AnnotationGrammar, path: &Path) -> TaskRecord {
        let content = fs::read_to_string(path).unwrap();
        parse_records(grammar, path, &content, Utc::now()).remove(0)
    }

    #[test]
    fn test_rewrite_priority_writes_once() {
        let (_tmp, path) = setup("fn main() {}\n// TODO(medium): fix\n");
        let grammar = AnnotationGrammar::new(&[]);
        let record = first_record(&grammar, &path);

        let outcome = rewrite_priority(&grammar, &record, Some(Priority::Low)).unwrap();
        assert_eq!(outcome, EditOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "fn main() {}\n// TODO(low): fix\n");

        let outcome = rewrite_priority(&grammar, &record, Some(Priority::Low)).unwrap();
        assert_eq!(outcome, EditOutcome::Unchanged);
    }

    #[test]
    fn test_rewrite_pin_toggles() {
        let original = "x = 1\n# BUG: crash on null\ny = 2\n";
        let (_tmp, path) = setup(original);
        let grammar = AnnotationGrammar::new(&[]);
        let record = first_record(&grammar, &path);

        assert_eq!(rewrite_pin(&grammar, &record).unwrap(), EditOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "x = 1\n# BUG *: crash on null\ny = 2\n");
        assert_eq!(rewrite_pin(&grammar, &record).unwrap(), EditOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_line_out_of_range() {
        let (_tmp, path) = setup("// TODO: x\n// TODO: y\n");
        let grammar = AnnotationGrammar::new(&[]);
        let mut record = first_record(&grammar, &path);
        record.location.line = 40;
        assert!(matches!(
            rewrite_priority(&grammar, &record, Some(Priority::High)),
            Err(EditError::Document(DocumentError::LineOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_tag_gone_from_line() {
        let (_tmp, path) = setup("// TODO: x\n");
        let grammar = AnnotationGrammar::new(&[]);
        let record = first_record(&grammar, &path);
        fs::write(&path, "// done already\n").unwrap();
        let err = rewrite_pin(&grammar, &record).unwrap_err();
        assert!(matches!(err, EditError::Rewrite { line: 1, .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "// done already\n");
    }
}
