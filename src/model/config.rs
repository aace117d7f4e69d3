use serde::{Deserialize, Serialize};

use super::task::Priority;

/// Built-in tag set used when nothing (or nothing usable) is configured.
pub const DEFAULT_TAGS: [&str; 4] = ["TODO", "FIXME", "BUG", "NOTE"];

/// Built-in exclusions: dependency dirs, build output, VCS metadata,
/// minified and source-map files.
pub const DEFAULT_EXCLUDES: [&str; 10] = [
    "**/node_modules/**",
    "**/dist/**",
    "**/build/**",
    "**/.git/**",
    "**/.vscode/**",
    "**/out/**",
    "**/coverage/**",
    "**/target/**",
    "**/*.min.*",
    "**/*.map",
];

/// Settings from `.tagscan.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Tag override. `None` means "use defaults".
    pub todo_patterns: Option<Vec<String>>,
    pub scan_on_startup: bool,
    pub auto_refresh_on_save: bool,
    pub ai_model: String,
    pub ollama_url: String,
    /// Lines of surrounding source sent with an advisory prompt
    pub context_lines: usize,
    /// Extra exclusion globs, added to [`DEFAULT_EXCLUDES`]
    pub exclude: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            todo_patterns: None,
            scan_on_startup: true,
            auto_refresh_on_save: true,
            ai_model: "llama3".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            context_lines: 5,
            exclude: Vec::new(),
        }
    }
}

impl Settings {
    /// The active tag list for this configuration.
    pub fn tags(&self) -> Vec<String> {
        resolve_tags(self.todo_patterns.as_deref())
    }

    /// Built-in exclusions followed by the configured extras.
    pub fn exclusion_globs(&self) -> Vec<String> {
        DEFAULT_EXCLUDES
            .iter()
            .map(|g| g.to_string())
            .chain(self.exclude.iter().cloned())
            .collect()
    }
}

/// Resolve the active tag set from an optional override.
///
/// Blank entries are ignored and duplicates (compared case-insensitively)
/// keep their first spelling. An override with nothing usable left falls back
/// to [`DEFAULT_TAGS`]; this never fails.
pub fn resolve_tags(override_tags: Option<&[String]>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in override_tags.unwrap_or_default() {
        let tag = tag.trim();
        if tag.is_empty() || tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            continue;
        }
        tags.push(tag.to_string());
    }
    if tags.is_empty() {
        DEFAULT_TAGS.iter().map(|t| t.to_string()).collect()
    } else {
        tags
    }
}

/// The fixed priority vocabulary.
pub fn priority_labels() -> [&'static str; 3] {
    Priority::ALL.map(Priority::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_override_uses_defaults() {
        assert_eq!(resolve_tags(None), strings(&DEFAULT_TAGS));
    }

    #[test]
    fn test_empty_override_uses_defaults() {
        assert_eq!(resolve_tags(Some(&[])), strings(&DEFAULT_TAGS));
        assert_eq!(resolve_tags(Some(&strings(&["", "  "]))), strings(&DEFAULT_TAGS));
    }

    #[test]
    fn test_override_replaces_defaults() {
        let tags = resolve_tags(Some(&strings(&["HACK", "todo", "TODO", "XXX"])));
        assert_eq!(tags, strings(&["HACK", "todo", "XXX"]));
    }

    #[test]
    fn test_priority_labels() {
        assert_eq!(priority_labels(), ["low", "medium", "high"]);
    }

    #[test]
    fn test_exclusion_globs_append_extras() {
        let settings = Settings {
            exclude: strings(&["**/vendor/**"]),
            ..Settings::default()
        };
        let globs = settings.exclusion_globs();
        assert_eq!(globs.len(), DEFAULT_EXCLUDES.len() + 1);
        assert_eq!(globs.last().map(String::as_str), Some("**/vendor/**"));
    }
}
