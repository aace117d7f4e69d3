use crate::model::task::Priority;
use crate::parse::grammar::{AnnotationGrammar, Head, PIN_MARKER};

/// Result of rewriting a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEdit {
    /// The line must be replaced with this text
    Changed(String),
    /// The requested metadata is already in place
    Unchanged,
}

impl LineEdit {
    fn between(original: &str, updated: String) -> LineEdit {
        if updated == original {
            LineEdit::Unchanged
        } else {
            LineEdit::Changed(updated)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    #[error("no {tag} annotation found on the line")]
    TagNotFound { tag: String },
}

/// Find the annotation head to edit: the one at `column` when it still
/// carries `tag`, else the first head with `tag` on the line.
fn locate(
    grammar: &AnnotationGrammar,
    line: &str,
    tag: &str,
    column: usize,
) -> Result<Head, RewriteError> {
    let heads = grammar.heads_for_tag(line, tag);
    let at_column = heads.iter().position(|h| h.intro == column).unwrap_or(0);
    heads
        .into_iter()
        .nth(at_column)
        .ok_or_else(|| RewriteError::TagNotFound { tag: tag.to_string() })
}

/// Set or clear the parenthesized priority after a tag.
///
/// An existing priority is replaced in place (whitespace before it is kept);
/// `None` removes it together with that whitespace; when there is none and a
/// priority is requested, it is inserted directly after the tag.
pub fn set_priority(
    grammar: &AnnotationGrammar,
    line: &str,
    tag: &str,
    column: usize,
    priority: Option<Priority>,
) -> Result<LineEdit, RewriteError> {
    let head = locate(grammar, line, tag, column)?;
    let after_tag = head.tag.end;
    let modifiers = grammar.modifiers(&line[after_tag..]);

    let updated = match (modifiers.priority, priority) {
        (Some(span), Some(p)) => {
            let existing = &line[after_tag + span.start..after_tag + span.end];
            let gap = existing.len() - existing.trim_start().len();
            format!(
                "{}({}){}",
                &line[..after_tag + span.start + gap],
                p,
                &line[after_tag + span.end..]
            )
        }
        (Some(span), None) => format!(
            "{}{}",
            &line[..after_tag + span.start],
            &line[after_tag + span.end..]
        ),
        (None, Some(p)) => format!("{}({}){}", &line[..after_tag], p, &line[after_tag..]),
        (None, None) => return Ok(LineEdit::Unchanged),
    };

    Ok(LineEdit::between(line, updated))
}

/// Add the pin marker if absent, remove it if present.
///
/// The marker goes directly after the priority when there is one
/// (`TODO(high)*:`), and after a space otherwise (`BUG *:`). A marker that
/// would be followed by `/` gets a space after it so it never reads as a
/// `*/` closer. Removal takes the whitespace before the marker with it (and
/// that extra space), so toggling twice restores the original line.
pub fn toggle_pin(
    grammar: &AnnotationGrammar,
    line: &str,
    tag: &str,
    column: usize,
) -> Result<LineEdit, RewriteError> {
    let head = locate(grammar, line, tag, column)?;
    let after_tag = head.tag.end;
    let modifiers = grammar.modifiers(&line[after_tag..]);

    let updated = match (modifiers.pin, modifiers.priority) {
        (Some(pin), _) => {
            let mut end = after_tag + pin.end;
            if line[end..].starts_with(" /") {
                end += 1;
            }
            format!("{}{}", &line[..after_tag + pin.start], &line[end..])
        }
        (None, Some(priority)) => insert_marker(line, after_tag + priority.end, ""),
        (None, None) => insert_marker(line, after_tag, " "),
    };

    Ok(LineEdit::between(line, updated))
}

fn insert_marker(line: &str, at: usize, lead: &str) -> String {
    let (before, after) = line.split_at(at);
    let trail = if after.starts_with('/') { " " } else { "" };
    format!("{before}{lead}{PIN_MARKER}{trail}{after}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::annotation_parser::parse_line;

    fn grammar() -> AnnotationGrammar {
        AnnotationGrammar::new(&[])
    }

    fn changed(edit: Result<LineEdit, RewriteError>) -> String {
        match edit {
            Ok(LineEdit::Changed(line)) => line,
            other => panic!("expected a change, got {other:?}"),
        }
    }

    #[test]
    fn test_replace_priority() {
        let g = grammar();
        let line = "// TODO(medium): fix";
        let out = changed(set_priority(&g, line, "TODO", 0, Some(Priority::Low)));
        assert_eq!(out, "// TODO(low): fix");
        assert_eq!(set_priority(&g, &out, "TODO", 0, Some(Priority::Low)), Ok(LineEdit::Unchanged));
    }

    #[test]
    fn test_replace_priority_keeps_spacing() {
        let g = grammar();
        let line = "# FIXME (low) * thing";
        let out = changed(set_priority(&g, line, "FIXME", 0, Some(Priority::High)));
        assert_eq!(out, "# FIXME (high) * thing");
    }

    #[test]
    fn test_insert_priority_when_absent() {
        let g = grammar();
        let out = changed(set_priority(&g, "// TODO: fix", "TODO", 0, Some(Priority::High)));
        assert_eq!(out, "// TODO(high): fix");
        let out = changed(set_priority(&g, "// BUG *: crash", "BUG", 0, Some(Priority::Low)));
        assert_eq!(out, "// BUG(low) *: crash");
    }

    #[test]
    fn test_clear_priority() {
        let g = grammar();
        let out = changed(set_priority(&g, "// TODO(high)*: fix", "TODO", 0, None));
        assert_eq!(out, "// TODO*: fix");
        let out = changed(set_priority(&g, "// TODO (high) fix", "TODO", 0, None));
        assert_eq!(out, "// TODO fix");
        assert_eq!(set_priority(&g, "// TODO: fix", "TODO", 0, None), Ok(LineEdit::Unchanged));
    }

    #[test]
    fn test_tag_match_is_case_insensitive() {
        let g = grammar();
        let line = "// todo(Medium): fix";
        let out = changed(set_priority(&g, line, "TODO", 0, Some(Priority::High)));
        assert_eq!(out, "// todo(high): fix");
    }

    #[test]
    fn test_missing_tag_is_an_error() {
        let g = grammar();
        assert_eq!(
            set_priority(&g, "let x = 1;", "TODO", 0, Some(Priority::Low)),
            Err(RewriteError::TagNotFound { tag: "TODO".to_string() })
        );
        assert!(toggle_pin(&g, "TODO in prose", "TODO", 0).is_err());
    }

    #[test]
    fn test_toggle_pin_round_trip() {
        let g = grammar();
        let line = "// BUG: crash on null";
        let pinned = changed(toggle_pin(&g, line, "BUG", 0));
        assert_eq!(pinned, "// BUG *: crash on null");
        let restored = changed(toggle_pin(&g, &pinned, "BUG", 0));
        assert_eq!(restored, line);
    }

    #[test]
    fn test_toggle_pin_after_priority() {
        let g = grammar();
        let line = "// TODO(high)*: refactor the parser";
        let unpinned = changed(toggle_pin(&g, line, "TODO", 0));
        assert_eq!(unpinned, "// TODO(high): refactor the parser");
        assert_eq!(changed(toggle_pin(&g, &unpinned, "TODO", 0)), line);
    }

    #[test]
    fn test_toggle_pin_before_slash() {
        let g = grammar();
        for line in ["// TODO/FIXME: x", "// TODO(high)/later: x"] {
            let pinned = changed(toggle_pin(&g, line, "TODO", 0));
            let parsed = parse_line(&g, &pinned).unwrap();
            assert!(parsed.pinned, "marker not read back in {pinned:?}");
            assert_eq!(changed(toggle_pin(&g, &pinned, "TODO", 0)), line);
        }
        assert_eq!(
            changed(toggle_pin(&g, "// TODO/FIXME: x", "TODO", 0)),
            "// TODO * /FIXME: x"
        );
    }

    #[test]
    fn test_toggle_pin_block_comment() {
        let g = grammar();
        let out = changed(toggle_pin(&g, "/* NOTE: keep in sync */", "NOTE", 0));
        assert_eq!(out, "/* NOTE *: keep in sync */");
    }

    #[test]
    fn test_edits_target_the_recorded_column() {
        let g = grammar();
        let line = "# TODO: a # TODO: b";
        let out = changed(set_priority(&g, line, "TODO", 10, Some(Priority::High)));
        assert_eq!(out, "# TODO: a # TODO(high): b");
        let out = changed(toggle_pin(&g, line, "TODO", 10));
        assert_eq!(out, "# TODO: a # TODO *: b");
    }

    #[test]
    fn test_stale_column_falls_back_to_first_head() {
        let g = grammar();
        let out = changed(set_priority(&g, "    // TODO: moved", "TODO", 0, Some(Priority::Low)));
        assert_eq!(out, "    // TODO(low): moved");
    }

    #[test]
    fn test_rewritten_line_parses_back() {
        let g = grammar();
        let line = "// FIXME: legacy path";
        let with_priority = changed(set_priority(&g, line, "FIXME", 0, Some(Priority::High)));
        let with_pin = changed(toggle_pin(&g, &with_priority, "FIXME", 0));
        let parsed = parse_line(&g, &with_pin).unwrap();
        assert_eq!(parsed.priority, Priority::High);
        assert!(parsed.pinned);
        assert_eq!(parsed.text, "legacy path");
    }
}
