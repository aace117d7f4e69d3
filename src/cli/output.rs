use std::path::Path;

use serde::Serialize;

use crate::model::task::{CompletionState, Priority, TaskRecord};
use crate::ops::session::EditReport;
use crate::ops::view::{ViewNode, relative_label};
use crate::util::unicode::{display_width, truncate_to_width};

/// Annotation text longer than this is cut in the tree view.
const TEXT_WIDTH: usize = 60;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub tag: String,
    pub priority: Priority,
    pub pinned: bool,
    pub state: CompletionState,
    pub text: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

#[derive(Serialize)]
pub struct GroupJson {
    pub file: String,
    pub tasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct EditJson {
    pub id: String,
    pub file: String,
    pub line: usize,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Serialize)]
pub struct SuggestionJson {
    pub id: String,
    pub model: String,
    pub suggestion: String,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(record: &TaskRecord, root: &Path) -> TaskJson {
    TaskJson {
        id: record.id.clone(),
        tag: record.tag.clone(),
        priority: record.priority,
        pinned: record.pinned,
        state: record.state,
        text: record.text.clone(),
        file: relative_label(&record.location.path, Some(root)),
        line: record.location.line,
        column: record.column,
        suggestions: record.suggestions.clone(),
    }
}

pub fn groups_to_json(nodes: &[ViewNode<'_>], root: &Path) -> Vec<GroupJson> {
    nodes
        .iter()
        .filter_map(|node| match node {
            ViewNode::Group {
                relative, tasks, ..
            } => Some(GroupJson {
                file: relative.clone(),
                tasks: tasks.iter().map(|t| task_to_json(t, root)).collect(),
            }),
            _ => None,
        })
        .collect()
}

/// Short outcome name and optional warning for an edit.
pub fn edit_outcome(report: &EditReport) -> (&'static str, Option<String>) {
    match report {
        EditReport::Written => ("written", None),
        EditReport::Unchanged => ("unchanged", None),
        EditReport::SourceStale { error } => {
            ("stale", Some(format!("source not updated: {error}")))
        }
        EditReport::NotFound => ("not_found", None),
    }
}

pub fn edit_to_json(record: &TaskRecord, root: &Path, report: &EditReport) -> EditJson {
    let (outcome, warning) = edit_outcome(report);
    EditJson {
        id: record.id.clone(),
        file: relative_label(&record.location.path, Some(root)),
        line: record.location.line,
        outcome,
        warning,
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// One-line listing: `src/main.rs:3  BUG(high)*  crash on null`
pub fn format_task_line(record: &TaskRecord, root: &Path) -> String {
    let done = if record.is_done() { " [x]" } else { "" };
    let pin = if record.pinned { "*" } else { "" };
    format!(
        "{}:{}  {}({}){}  {}{}",
        relative_label(&record.location.path, Some(root)),
        record.location.line,
        record.tag,
        record.priority,
        pin,
        record.text,
        done
    )
}

fn pad_to(text: &str, width: usize) -> String {
    let gap = width.saturating_sub(display_width(text));
    format!("{text}{}", " ".repeat(gap))
}

/// Render the projected tree: a header per file, one aligned row per task,
/// and optionally the numbered suggestions beneath each task.
pub fn render_tree(nodes: &[ViewNode<'_>], show_suggestions: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for group in nodes {
        lines.push(group.label());
        let tasks = group.children();
        let texts: Vec<String> = tasks
            .iter()
            .map(|t| truncate_to_width(&t.label(), TEXT_WIDTH))
            .collect();
        let width = texts.iter().map(|t| display_width(t)).max().unwrap_or(0);

        for (node, text) in tasks.iter().zip(&texts) {
            let ViewNode::Task(record) = node else {
                continue;
            };
            let check = if record.is_done() { "[x]" } else { "[ ]" };
            let pin = if record.pinned { "*" } else { " " };
            lines.push(format!(
                "  {check}{pin} {}  {}  {}",
                pad_to(text, width),
                node.description().unwrap_or_default(),
                record.priority
            ));
            if show_suggestions {
                for child in node.children() {
                    lines.push(format!("       {}", child.label()));
                }
            }
        }
    }
    lines
}

/// Human message for an edit on `record`.
pub fn format_edit(record: &TaskRecord, root: &Path, report: &EditReport) -> String {
    let place = format!(
        "{}:{}",
        relative_label(&record.location.path, Some(root)),
        record.location.line
    );
    match report {
        EditReport::Written => format!("updated {place}"),
        EditReport::Unchanged => format!("{place} already up to date"),
        EditReport::SourceStale { .. } => format!("updated {place} in memory only"),
        EditReport::NotFound => format!("{place} is no longer in the scan"),
    }
}
