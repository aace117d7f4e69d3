use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::model::task::TaskRecord;
use crate::parse::{AnnotationGrammar, parse_records};

/// Compiled exclusion globs, matched against paths relative to the root.
#[derive(Debug, Clone)]
pub struct Exclusions {
    set: GlobSet,
}

impl Exclusions {
    /// Compile the given globs. Invalid globs are logged and skipped.
    pub fn new<S: AsRef<str>>(globs: &[S]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for glob in globs {
            match Glob::new(glob.as_ref()) {
                Ok(g) => {
                    builder.add(g);
                }
                Err(e) => warn!("ignoring invalid exclude glob {:?}: {e}", glob.as_ref()),
            }
        }
        let set = builder.build().unwrap_or_else(|e| {
            warn!("could not build exclude set: {e}");
            GlobSet::empty()
        });
        Exclusions { set }
    }

    pub fn is_excluded_file(&self, relative: &Path) -> bool {
        self.set.is_match(relative)
    }

    /// Directory globs are written as `dir/**`, which only match what is
    /// inside the directory, so test a child path.
    pub fn is_excluded_dir(&self, relative: &Path) -> bool {
        self.set.is_match(relative) || self.set.is_match(relative.join("_"))
    }

    /// Check an absolute or root-relative path.
    pub fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        self.is_excluded_file(relative)
    }
}

/// List candidate files under `root`, pruning excluded directories.
pub fn enumerate_files(root: &Path, exclusions: &Exclusions) -> Vec<PathBuf> {
    let walker = WalkDir::new(root).follow_links(false).into_iter();
    let mut files = Vec::new();

    for entry in walker.filter_entry(|e| {
        let relative = e.path().strip_prefix(root).unwrap_or(e.path());
        if relative.as_os_str().is_empty() {
            return true;
        }
        if e.file_type().is_dir() {
            !exclusions.is_excluded_dir(relative)
        } else {
            !exclusions.is_excluded_file(relative)
        }
    }) {
        match entry {
            Ok(e) if e.file_type().is_file() => files.push(e.into_path()),
            Ok(_) => {}
            Err(e) => warn!("skipping unreadable entry: {e}"),
        }
    }

    files
}

/// Scan one file. Failures are logged and yield no records.
async fn scan_file(
    grammar: &AnnotationGrammar,
    path: PathBuf,
    created_at: DateTime<Utc>,
) -> Vec<TaskRecord> {
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => parse_records(grammar, &path, &content, created_at),
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            debug!(path = %path.display(), "skipping non-text file");
            Vec::new()
        }
        Err(e) => {
            warn!(path = %path.display(), "could not scan file: {e}");
            Vec::new()
        }
    }
}

/// Scan files concurrently, one task per file, and merge the results.
///
/// Per-file line order is preserved; files come back in the order given.
pub async fn scan_files(grammar: Arc<AnnotationGrammar>, files: Vec<PathBuf>) -> Vec<TaskRecord> {
    let created_at = Utc::now();
    let handles: Vec<_> = files
        .into_iter()
        .map(|path| {
            let grammar = Arc::clone(&grammar);
            tokio::spawn(async move { scan_file(&grammar, path, created_at).await })
        })
        .collect();

    let mut records = Vec::new();
    for result in join_all(handles).await {
        match result {
            Ok(found) => records.extend(found),
            Err(e) => warn!("scan task failed: {e}"),
        }
    }
    records
}

/// Enumerate and scan a whole workspace.
pub async fn scan_workspace(
    root: &Path,
    grammar: Arc<AnnotationGrammar>,
    exclusions: &Exclusions,
) -> Vec<TaskRecord> {
    let files = enumerate_files(root, exclusions);
    debug!(root = %root.display(), files = files.len(), "scanning workspace");
    let records = scan_files(grammar, files).await;
    debug!(records = records.len(), "scan complete");
    records
}
