use std::cmp::Ordering;
use std::path::Path;

use indexmap::IndexMap;

use crate::model::task::{InvalidPriority, Priority, TaskRecord};

/// Active filters. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    /// Tag to keep, compared case-insensitively
    pub task_type: Option<String>,
    pub priority: Option<Priority>,
    /// Case-insensitive substring over text, tag, priority and file name
    pub query: Option<String>,
}

fn is_all(raw: &str) -> bool {
    raw.trim().is_empty() || raw.trim().eq_ignore_ascii_case("all")
}

impl ViewFilter {
    /// Parse a type filter; `all` or blank clears it.
    pub fn parse_type(raw: &str) -> Option<String> {
        (!is_all(raw)).then(|| raw.trim().to_uppercase())
    }

    /// Parse a priority filter; `all` or blank clears it.
    pub fn parse_priority(raw: &str) -> Result<Option<Priority>, InvalidPriority> {
        if is_all(raw) {
            Ok(None)
        } else {
            raw.parse().map(Some)
        }
    }

    /// Blank queries clear the search.
    pub fn parse_query(raw: &str) -> Option<String> {
        let q = raw.trim();
        (!q.is_empty()).then(|| q.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.task_type.is_none() && self.priority.is_none() && self.query.is_none()
    }

    /// All active filters must accept the record.
    pub fn matches(&self, record: &TaskRecord) -> bool {
        if let Some(t) = &self.task_type
            && !record.tag.eq_ignore_ascii_case(t)
        {
            return false;
        }
        if let Some(p) = self.priority
            && record.priority != p
        {
            return false;
        }
        if let Some(q) = &self.query {
            let q = q.to_lowercase();
            let fields = [
                record.text.as_str(),
                record.tag.as_str(),
                record.priority.as_str(),
                record.location.basename(),
            ];
            if !fields.iter().any(|f| f.to_lowercase().contains(&q)) {
                return false;
            }
        }
        true
    }
}

/// A node in the projected tree.
#[derive(Debug, Clone)]
pub enum ViewNode<'a> {
    /// All visible tasks of one file
    Group {
        path: &'a Path,
        relative: String,
        tasks: Vec<&'a TaskRecord>,
    },
    Task(&'a TaskRecord),
    /// One advisory suggestion beneath its task
    Suggestion { task: &'a TaskRecord, index: usize },
}

impl<'a> ViewNode<'a> {
    pub fn label(&self) -> String {
        match self {
            ViewNode::Group {
                relative, tasks, ..
            } => format!("{} ({})", relative, tasks.len()),
            ViewNode::Task(record) => record.text.clone(),
            ViewNode::Suggestion { task, index } => {
                format!("{}. {}", index + 1, task.suggestions[*index])
            }
        }
    }

    /// Secondary text shown next to the label.
    pub fn description(&self) -> Option<String> {
        match self {
            ViewNode::Group { .. } | ViewNode::Suggestion { .. } => None,
            ViewNode::Task(record) => Some(format!(
                "({}) {}:{}",
                record.tag,
                record.location.basename(),
                record.location.line
            )),
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ViewNode::Group { .. } => "folder",
            ViewNode::Suggestion { .. } => "lightbulb",
            ViewNode::Task(record) if record.is_done() => "check",
            ViewNode::Task(record) => match record.tag.as_str() {
                "TODO" => "checklist",
                "FIXME" => "tools",
                "BUG" => "bug",
                "NOTE" => "notebook",
                _ => "tag",
            },
        }
    }

    pub fn is_expandable(&self) -> bool {
        match self {
            ViewNode::Group { tasks, .. } => !tasks.is_empty(),
            ViewNode::Task(record) => !record.suggestions.is_empty(),
            ViewNode::Suggestion { .. } => false,
        }
    }

    /// Child nodes. Suggestions are only built when a task is expanded.
    pub fn children(&self) -> Vec<ViewNode<'a>> {
        match self {
            ViewNode::Group { tasks, .. } => tasks.iter().map(|t| ViewNode::Task(*t)).collect(),
            ViewNode::Task(record) => (0..record.suggestions.len())
                .map(|index| ViewNode::Suggestion {
                    task: *record,
                    index,
                })
                .collect(),
            ViewNode::Suggestion { .. } => Vec::new(),
        }
    }
}

/// Pinned tasks first, then by text.
fn task_order(a: &TaskRecord, b: &TaskRecord) -> Ordering {
    b.pinned.cmp(&a.pinned).then_with(|| a.text.cmp(&b.text))
}

/// Path shown in group labels: relative to `root` when inside it.
pub fn relative_label(path: &Path, root: Option<&Path>) -> String {
    let shown = root.and_then(|r| path.strip_prefix(r).ok()).unwrap_or(path);
    shown.to_string_lossy().replace('\\', "/")
}

/// Project records into file groups: filtered, grouped by file, groups
/// sorted by label, tasks sorted pinned-first then by text.
pub fn project<'a>(
    records: &'a [TaskRecord],
    filter: &ViewFilter,
    root: Option<&Path>,
) -> Vec<ViewNode<'a>> {
    let mut by_file: IndexMap<&'a Path, Vec<&'a TaskRecord>> = IndexMap::new();
    for record in records.iter().filter(|r| filter.matches(r)) {
        by_file
            .entry(record.location.path.as_path())
            .or_default()
            .push(record);
    }

    let mut groups: Vec<(String, ViewNode<'a>)> = by_file
        .into_iter()
        .map(|(path, mut tasks)| {
            tasks.sort_by(|a, b| task_order(a, b));
            let node = ViewNode::Group {
                path,
                relative: relative_label(path, root),
                tasks,
            };
            (node.label(), node)
        })
        .collect();
    groups.sort_by(|a, b| a.0.cmp(&b.0));
    groups.into_iter().map(|(_, node)| node).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{CompletionState, Location};
    use chrono::Utc;
    use std::path::PathBuf;

    fn record(
        file: &str,
        line: usize,
        tag: &str,
        priority: Priority,
        pinned: bool,
        text: &str,
    ) -> TaskRecord {
        let path = PathBuf::from(format!("/ws/{file}"));
        TaskRecord {
            id: TaskRecord::identity(&path, line - 1, 0),
            text: text.to_string(),
            tag: tag.to_string(),
            priority,
            pinned,
            location: Location { path, line },
            column: 0,
            state: CompletionState::Open,
            created_at: Utc::now(),
            suggestions: Vec::new(),
        }
    }

    fn sample() -> Vec<TaskRecord> {
        vec![
            record("src/z.rs", 1, "TODO", Priority::Low, false, "zebra"),
            record("src/b.rs", 2, "BUG", Priority::High, false, "crash on null"),
            record("src/b.rs", 9, "TODO", Priority::Medium, true, "wire retries"),
            record("src/b.rs", 4, "NOTE", Priority::Medium, false, "alpha ordering"),
            record("lib/a.py", 3, "FIXME", Priority::High, false, "legacy path"),
        ]
    }

    fn group_labels(nodes: &[ViewNode<'_>]) -> Vec<String> {
        nodes.iter().map(|n| n.label()).collect()
    }

    fn task_texts(group: &ViewNode<'_>) -> Vec<String> {
        group.children().iter().map(|n| n.label()).collect()
    }

    #[test]
    fn test_unfiltered_groups_sorted_by_label() {
        let records = sample();
        let groups = project(&records, &ViewFilter::default(), Some(Path::new("/ws")));
        assert_eq!(group_labels(&groups), vec!["lib/a.py (1)", "src/b.rs (3)", "src/z.rs (1)"]);
    }

    #[test]
    fn test_pinned_first_then_lexical() {
        let records = sample();
        let groups = project(&records, &ViewFilter::default(), Some(Path::new("/ws")));
        assert_eq!(task_texts(&groups[1]), vec!["wire retries", "alpha ordering", "crash on null"]);
    }

    #[test]
    fn test_type_filter_is_case_insensitive() {
        let records = sample();
        let filter = ViewFilter {
            task_type: ViewFilter::parse_type("todo"),
            ..ViewFilter::default()
        };
        let groups = project(&records, &filter, Some(Path::new("/ws")));
        assert_eq!(group_labels(&groups), vec!["src/b.rs (1)", "src/z.rs (1)"]);
    }

    #[test]
    fn test_type_and_priority_intersect() {
        let records = sample();
        let filter = ViewFilter {
            task_type: Some("TODO".to_string()),
            priority: Some(Priority::Low),
            query: None,
        };
        let groups = project(&records, &filter, Some(Path::new("/ws")));
        assert_eq!(groups.len(), 1);
        assert_eq!(task_texts(&groups[0]), vec!["zebra"]);
    }

    #[test]
    fn test_search_fields() {
        let records = sample();
        let by = |q: &str| {
            let filter = ViewFilter {
                query: ViewFilter::parse_query(q),
                ..ViewFilter::default()
            };
            records.iter().filter(|r| filter.matches(r)).count()
        };
        assert_eq!(by("CRASH"), 1); // text
        assert_eq!(by("fixme"), 1); // tag
        assert_eq!(by("high"), 2); // priority
        assert_eq!(by("a.py"), 1); // file name
        assert_eq!(by("src/"), 0); // directories are not searched
        assert_eq!(by("   "), records.len());
    }

    #[test]
    fn test_all_clears_filters() {
        assert_eq!(ViewFilter::parse_type("All"), None);
        assert_eq!(ViewFilter::parse_priority("all"), Ok(None));
        assert_eq!(ViewFilter::parse_priority("HIGH"), Ok(Some(Priority::High)));
        assert!(ViewFilter::parse_priority("urgent").is_err());
    }

    #[test]
    fn test_group_outside_root_uses_full_path() {
        let records = vec![record("x.rs", 1, "TODO", Priority::Medium, false, "x")];
        let groups = project(&records, &ViewFilter::default(), Some(Path::new("/elsewhere")));
        assert_eq!(groups[0].label(), "/ws/x.rs (1)");
    }

    #[test]
    fn test_task_node_rendering() {
        let mut r = record("src/b.rs", 2, "BUG", Priority::High, false, "crash on null");
        let node = ViewNode::Task(&r);
        assert_eq!(node.description().as_deref(), Some("(BUG) b.rs:2"));
        assert_eq!(node.icon(), "bug");
        assert!(!node.is_expandable());

        r.state = CompletionState::Done;
        assert_eq!(ViewNode::Task(&r).icon(), "check");
    }

    #[test]
    fn test_suggestions_expand_lazily_in_order() {
        let mut r = record("src/b.rs", 2, "BUG", Priority::High, false, "crash on null");
        r.suggestions = vec!["check for null".to_string(), "add a test".to_string()];
        let node = ViewNode::Task(&r);
        assert!(node.is_expandable());
        let children = node.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].label(), "1. check for null");
        assert_eq!(children[1].label(), "2. add a test");
        assert_eq!(children[1].icon(), "lightbulb");
        assert!(children[1].children().is_empty());
    }
}
