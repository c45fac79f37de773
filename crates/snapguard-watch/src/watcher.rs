//! Poll-based directory watcher.
//!
//! Scans the configured directories on a fixed interval and emits paths of
//! newly appeared screenshot files over an mpsc channel. Files that already
//! exist when the watcher starts are remembered but never emitted.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::is_screenshot_file;

/// Background watcher that polls directories for new screenshot files.
pub struct DirectoryWatcher {
    directories: Vec<PathBuf>,
    poll_interval: Duration,
    shutdown: Arc<Notify>,
}

impl DirectoryWatcher {
    /// Create a new watcher over the given directories.
    pub fn new(directories: Vec<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            directories,
            poll_interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle used to stop the watcher loop.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Run the watch loop, sending newly detected screenshot paths to `tx`.
    ///
    /// Returns when the shutdown handle is notified or the receiving side
    /// of the channel is dropped. Directories that do not exist are skipped
    /// with a warning and re-probed on every tick, so a directory appearing
    /// later is picked up.
    pub async fn run(self, tx: mpsc::Sender<PathBuf>) {
        for dir in &self.directories {
            if dir.is_dir() {
                info!(dir = %dir.display(), "Watching directory");
            } else {
                warn!(dir = %dir.display(), "Watched directory does not exist");
            }
        }

        // Initial scan: remember pre-existing files without emitting events.
        let mut seen: HashSet<PathBuf> = HashSet::new();
        for dir in &self.directories {
            for path in list_dir(dir).await {
                seen.insert(path);
            }
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.shutdown.notified() => {
                    info!("Directory watcher shutting down");
                    return;
                }
            }

            for dir in &self.directories {
                for path in list_dir(dir).await {
                    if !seen.insert(path.clone()) {
                        continue;
                    }
                    if !is_screenshot_file(&path) {
                        continue;
                    }
                    debug!(path = %path.display(), "New screenshot detected");
                    if tx.send(path).await.is_err() {
                        // Receiver gone; nothing left to notify.
                        return;
                    }
                }
            }
        }
    }
}

/// List regular files in a directory, tolerating a missing or unreadable
/// directory (returns empty).
async fn list_dir(dir: &PathBuf) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return paths,
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths
}
