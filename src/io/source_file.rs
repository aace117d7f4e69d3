use std::fs;
use std::io::{self, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Error type for source document operations
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("line {line} is out of range for {path} ({count} lines)")]
    LineOutOfRange {
        path: PathBuf,
        line: usize,
        count: usize,
    },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
}

/// A line-addressable view of a text file.
///
/// Lines are numbered from 0 and split the same way as [`str::lines`].
/// Replacing a line touches only that line's content; terminators and every
/// other byte of the file are left as they were.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    path: PathBuf,
    text: String,
    lines: Vec<Range<usize>>,
}

impl SourceDocument {
    /// Read a document from disk.
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let text = fs::read_to_string(path).map_err(|e| DocumentError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::from_text(path, text))
    }

    /// Wrap text that was already loaded from `path`.
    pub fn from_text(path: &Path, text: String) -> Self {
        let lines = line_spans(&text);
        SourceDocument {
            path: path.to_path_buf(),
            text,
            lines,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Text of line `idx` without its terminator.
    pub fn line(&self, idx: usize) -> Result<&str, DocumentError> {
        let span = self.span(idx)?;
        Ok(&self.text[span])
    }

    /// Replace the content of line `idx`.
    pub fn replace_line(&mut self, idx: usize, content: &str) -> Result<(), DocumentError> {
        let span = self.span(idx)?;
        self.text.replace_range(span, content);
        self.lines = line_spans(&self.text);
        Ok(())
    }

    /// Write the document back to its path atomically.
    pub fn save(&self) -> Result<(), DocumentError> {
        atomic_write(&self.path, self.text.as_bytes()).map_err(|e| DocumentError::WriteError {
            path: self.path.clone(),
            source: e,
        })
    }

    fn span(&self, idx: usize) -> Result<Range<usize>, DocumentError> {
        self.lines
            .get(idx)
            .cloned()
            .ok_or_else(|| DocumentError::LineOutOfRange {
                path: self.path.clone(),
                line: idx + 1,
                count: self.lines.len(),
            })
    }
}

/// Byte ranges of each line's content, excluding `\n` and a `\r` before it.
fn line_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            let end = if i > start && text.as_bytes()[i - 1] == b'\r' { i - 1 } else { i };
            spans.push(start..end);
            start = i + 1;
        }
    }
    if start < text.len() {
        spans.push(start..text.len());
    }
    spans
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
