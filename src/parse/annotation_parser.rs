use std::path::Path;

use chrono::{DateTime, Utc};

use crate::model::task::{CompletionState, Location, Priority, TaskRecord};
use crate::parse::grammar::{AnnotationGrammar, clean_text, separator_len};

/// One annotation found on a line, before it is tied to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Byte offset of the comment introducer
    pub offset: usize,
    /// Uppercased tag keyword
    pub tag: String,
    pub priority: Priority,
    pub pinned: bool,
    pub text: String,
}

/// Extract the annotation on a single line, if any.
///
/// The leftmost annotation head wins and its free text runs to the end of
/// the line, so tag words later in that text stay part of it. `None` when
/// there is no head or the cleaned text is empty.
pub fn parse_line(grammar: &AnnotationGrammar, line: &str) -> Option<Annotation> {
    let head = grammar.first_head(line)?;
    let after_tag = head.tag.end;
    let modifiers = grammar.modifiers(&line[after_tag..]);
    let sep_start = after_tag + modifiers.end;
    let text_start = sep_start + separator_len(&line[sep_start..]);

    let text = clean_text(&line[text_start..]);
    if text.is_empty() {
        return None;
    }

    Some(Annotation {
        offset: head.intro,
        tag: line[head.tag.clone()].to_uppercase(),
        priority: modifiers.level.unwrap_or_default(),
        pinned: modifiers.pin.is_some(),
        text: text.to_string(),
    })
}

/// Extract task records from the full text of one file.
///
/// Lines are scanned independently; each yields at most one record, in
/// line order.
pub fn parse_records(
    grammar: &AnnotationGrammar,
    path: &Path,
    content: &str,
    created_at: DateTime<Utc>,
) -> Vec<TaskRecord> {
    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if let Some(annotation) = parse_line(grammar, line) {
            records.push(TaskRecord {
                id: TaskRecord::identity(path, idx, annotation.offset),
                text: annotation.text,
                tag: annotation.tag,
                priority: annotation.priority,
                pinned: annotation.pinned,
                location: Location {
                    path: path.to_path_buf(),
                    line: idx + 1,
                },
                column: annotation.offset,
                state: CompletionState::Open,
                created_at,
                suggestions: Vec::new(),
            });
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grammar() -> AnnotationGrammar {
        AnnotationGrammar::new(&[])
    }

    fn single(line: &str) -> Annotation {
        parse_line(&grammar(), line).unwrap_or_else(|| panic!("expected an annotation in {line:?}"))
    }

    #[test]
    fn test_priority_and_pin() {
        let a = single("// TODO(high)*: refactor the parser");
        assert_eq!(
            a,
            Annotation {
                offset: 0,
                tag: "TODO".to_string(),
                priority: Priority::High,
                pinned: true,
                text: "refactor the parser".to_string(),
            }
        );
    }

    #[test]
    fn test_hash_comment_defaults() {
        let a = single("# FIXME: legacy path");
        assert_eq!(a.tag, "FIXME");
        assert_eq!(a.priority, Priority::Medium);
        assert!(!a.pinned);
        assert_eq!(a.text, "legacy path");
    }

    #[test]
    fn test_tag_is_uppercased() {
        for line in ["// todo: x", "// ToDo: x", "// TODO: x"] {
            assert_eq!(single(line).tag, "TODO");
        }
    }

    #[test]
    fn test_priority_token_is_lowercased() {
        assert_eq!(single("// BUG(LOW): x").priority, Priority::Low);
        assert_eq!(single("// BUG( Medium ): x").priority, Priority::Medium);
        assert_eq!(single("// BUG (high) x").priority, Priority::High);
    }

    #[test]
    fn test_unknown_priority_stays_in_text() {
        let a = single("// TODO(urgent): x");
        assert_eq!(a.priority, Priority::Medium);
        assert_eq!(a.text, "(urgent): x");
    }

    #[test]
    fn test_pin_with_space() {
        let a = single("// BUG *: crash on null");
        assert!(a.pinned);
        assert_eq!(a.text, "crash on null");
    }

    #[test]
    fn test_block_and_html_closers() {
        assert_eq!(single("/* TODO: tidy up */").text, "tidy up");
        assert_eq!(single("<!-- NOTE: layout hack -->").text, "layout hack");
        assert!(!single("/* TODO tidy */").pinned);
    }

    #[test]
    fn test_closer_is_not_a_pin() {
        assert!(parse_line(&grammar(), "/* TODO */").is_none());
        assert!(parse_line(&grammar(), "/* TODO*/").is_none());
    }

    #[test]
    fn test_empty_text_is_dropped() {
        assert!(parse_line(&grammar(), "// TODO:").is_none());
        assert!(parse_line(&grammar(), "// TODO(high)*:   ").is_none());
    }

    #[test]
    fn test_prose_is_not_a_task() {
        assert!(parse_line(&grammar(), "Remember the TODO list").is_none());
        assert!(parse_line(&grammar(), "let todo = 1;").is_none());
    }

    #[test]
    fn test_continuation_line_in_block_comment() {
        let a = single("   * NOTE: explains the retry loop");
        assert_eq!(a.offset, 3);
        assert_eq!(a.text, "explains the retry loop");
    }

    #[test]
    fn test_other_comment_styles() {
        assert_eq!(single("-- TODO: index this column").text, "index this column");
        assert_eq!(single("; FIXME handle eof").text, "handle eof");
        assert_eq!(single("% BUG: wrong bound").text, "wrong bound");
    }

    #[test]
    fn test_later_tags_stay_in_text() {
        let a = single("x(); // TODO: first /* FIXME(low): second */");
        assert_eq!(a.tag, "TODO");
        assert_eq!(a.offset, 5);
        assert_eq!(a.text, "first /* FIXME(low): second");

        for (line, tag, text) in [
            ("// TODO: port the # FIXME hack from v1", "TODO", "port the # FIXME hack from v1"),
            (
                "// NOTE: keep ; TODO markers out of strings",
                "NOTE",
                "keep ; TODO markers out of strings",
            ),
            ("# TODO: drop the -- NOTE column", "TODO", "drop the -- NOTE column"),
        ] {
            let a = single(line);
            assert_eq!((a.tag.as_str(), a.text.as_str()), (tag, text), "for {line:?}");
        }
    }

    #[test]
    fn test_empty_first_annotation_swallows_the_rest() {
        let a = single("// TODO: // FIXME: x");
        assert_eq!(a.tag, "TODO");
        assert_eq!(a.text, "// FIXME: x");
    }

    #[test]
    fn test_trailing_code_comment() {
        let a = single("    retry(3); // TODO: make configurable");
        assert_eq!(a.offset, 14);
        assert_eq!(a.text, "make configurable");
    }

    #[test]
    fn test_custom_tags() {
        let g = AnnotationGrammar::new(&["hack".to_string()]);
        let found = parse_line(&g, "// Hack: skip the cache").unwrap();
        assert_eq!(found.tag, "HACK");
        assert!(parse_line(&g, "// TODO: not configured").is_none());
    }

    #[test]
    fn test_parse_records_identity_and_location() {
        let content = "fn main() {}\n// TODO: one\n\n  # NOTE: two\n";
        let now = Utc::now();
        let records = parse_records(&grammar(), Path::new("/ws/a.rs"), content, now);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "/ws/a.rs-1-0");
        assert_eq!(records[0].location.line, 2);
        assert_eq!(records[1].id, "/ws/a.rs-3-2");
        assert_eq!(records[1].location.line, 4);
        assert_eq!(records[1].column, 2);
        assert!(records.iter().all(|r| r.suggestions.is_empty() && !r.is_done()));
        assert!(records.iter().all(|r| r.created_at == now));
    }

    #[test]
    fn test_one_record_per_line() {
        let content = "# TODO: a # FIXME: b\n# NOTE: c\n";
        let records = parse_records(&grammar(), Path::new("/ws/b.py"), content, Utc::now());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tag, "TODO");
        assert_eq!(records[0].text, "a # FIXME: b");
        assert_eq!(records[0].id, "/ws/b.py-0-0");
        assert_eq!(records[1].id, "/ws/b.py-1-0");
    }
}
