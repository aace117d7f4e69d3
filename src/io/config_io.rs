use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::config::Settings;

/// Name of the optional settings file at the workspace root.
pub const SETTINGS_FILE: &str = ".tagscan.toml";

/// Error type for reading settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// On-disk shape. `todo_patterns` stays untyped so a wrong type degrades to
/// the default tag set instead of rejecting the whole file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    #[serde(alias = "todoPatterns")]
    todo_patterns: Option<toml::Value>,
    #[serde(alias = "scanOnStartup")]
    scan_on_startup: Option<bool>,
    #[serde(alias = "autoRefreshOnSave")]
    auto_refresh_on_save: Option<bool>,
    #[serde(alias = "aiModel")]
    ai_model: Option<String>,
    #[serde(alias = "ollamaUrl")]
    ollama_url: Option<String>,
    #[serde(alias = "contextLines")]
    context_lines: Option<usize>,
    exclude: Option<Vec<String>>,
}

impl RawSettings {
    fn into_settings(self) -> Settings {
        let defaults = Settings::default();
        Settings {
            todo_patterns: self.todo_patterns.and_then(string_array),
            scan_on_startup: self.scan_on_startup.unwrap_or(defaults.scan_on_startup),
            auto_refresh_on_save: self
                .auto_refresh_on_save
                .unwrap_or(defaults.auto_refresh_on_save),
            ai_model: self.ai_model.unwrap_or(defaults.ai_model),
            ollama_url: self.ollama_url.unwrap_or(defaults.ollama_url),
            context_lines: self.context_lines.unwrap_or(defaults.context_lines),
            exclude: self.exclude.unwrap_or(defaults.exclude),
        }
    }
}

/// Keep the string members of an array value; anything else is ignored.
fn string_array(value: toml::Value) -> Option<Vec<String>> {
    match value {
        toml::Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    }
}

/// Parse settings text.
pub fn parse_settings(text: &str) -> Result<Settings, toml::de::Error> {
    let raw: RawSettings = toml::from_str(text)?;
    Ok(raw.into_settings())
}

/// Read the settings file under `root`. `Ok(None)` when there is none.
pub fn read_settings(root: &Path) -> Result<Option<Settings>, ConfigError> {
    let path = root.join(SETTINGS_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    let settings = parse_settings(&text).map_err(|e| ConfigError::ParseError { path, source: e })?;
    Ok(Some(settings))
}

/// Read settings, falling back to defaults when the file is missing or
/// unusable. Never fails.
pub fn load_settings(root: &Path) -> Settings {
    match read_settings(root) {
        Ok(Some(settings)) => {
            debug!(root = %root.display(), "loaded settings");
            settings
        }
        Ok(None) => Settings::default(),
        Err(e) => {
            warn!("{e}; using default settings");
            Settings::default()
        }
    }
}
