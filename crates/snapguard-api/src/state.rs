//! Application state shared across all route handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use snapguard_storage::ScanRepository;

/// Shared application state, cheap to clone across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Scan record store.
    pub repository: Arc<ScanRepository>,
    /// Managed screenshot directory served at /uploads.
    pub uploads_dir: PathBuf,
    /// Server start time for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(repository: Arc<ScanRepository>, uploads_dir: PathBuf) -> Self {
        Self {
            repository,
            uploads_dir,
            start_time: Instant::now(),
        }
    }
}
