use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use crate::io::scanner::Exclusions;

/// Events sent from the file watcher to the refresh loop.
#[derive(Debug)]
pub enum FileEvent {
    /// One or more workspace files changed on disk.
    Changed(Vec<PathBuf>),
}

/// A file system watcher for a workspace root.
pub struct WorkspaceWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<FileEvent>,
}

impl WorkspaceWatcher {
    /// Start watching `root`, ignoring paths matched by `exclusions`.
    pub fn start(root: &Path, exclusions: Exclusions) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let root_owned = root.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        debug!("watch error: {e}");
                        return;
                    }
                };

                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }

                let relevant = relevant_paths(&root_owned, &exclusions, event.paths);
                if !relevant.is_empty() {
                    let _ = tx.send(FileEvent::Changed(relevant));
                }
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(WorkspaceWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Block until at least one event arrives, then drain whatever else
    /// shows up within `settle`. Returns the changed paths, deduplicated.
    /// `None` when the watcher has shut down.
    pub fn wait(&self, settle: Duration) -> Option<Vec<PathBuf>> {
        next_batch(&self.rx, settle)
    }
}

/// Keep the paths inside `root` that are neither excluded nor temp files
/// left behind by atomic saves.
pub fn relevant_paths(root: &Path, exclusions: &Exclusions, paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|p| {
            if !p.starts_with(root) {
                return false;
            }
            if let Some(name) = p.file_name().and_then(|n| n.to_str())
                && name.starts_with(".tmp")
            {
                return false;
            }
            !exclusions.is_excluded(root, p)
        })
        .collect()
}

fn next_batch(rx: &mpsc::Receiver<FileEvent>, settle: Duration) -> Option<Vec<PathBuf>> {
    let FileEvent::Changed(mut paths) = rx.recv().ok()?;
    while let Ok(FileEvent::Changed(more)) = rx.recv_timeout(settle) {
        paths.extend(more);
    }
    paths.sort();
    paths.dedup();
    Some(paths)
}
