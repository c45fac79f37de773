//! Retention scheduler with a fixed-interval deletion sweep.
//!
//! Each sweep selects records flagged for deletion whose deletion date has
//! passed, deletes the on-disk file if it still exists, then deletes the
//! record. A missing file is not an error and a record that vanished
//! mid-sweep is benign, so running the sweep twice over the same state is
//! a no-op the second time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use snapguard_core::error::SnapguardError;
use snapguard_core::types::ScanRecord;
use snapguard_storage::ScanRepository;

/// Counters from one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub examined: usize,
    pub deleted: usize,
    pub failures: usize,
}

/// Background scheduler that deletes expired screenshots and their records.
pub struct RetentionScheduler {
    repository: Arc<ScanRepository>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl RetentionScheduler {
    pub fn new(repository: Arc<ScanRepository>, interval: Duration) -> Self {
        Self {
            repository,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle used to stop the sweep loop.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Run the sweep loop until shutdown is signalled.
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Retention scheduler started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    match self.sweep_once().await {
                        Ok(outcome) if outcome.examined > 0 => {
                            info!(
                                examined = outcome.examined,
                                deleted = outcome.deleted,
                                failures = outcome.failures,
                                "Deletion sweep finished"
                            );
                        }
                        Ok(_) => debug!("Deletion sweep found nothing due"),
                        Err(e) => error!(error = %e, "Deletion sweep failed"),
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("Retention scheduler shutting down");
                    return;
                }
            }
        }
    }

    /// One sweep pass over currently due records.
    ///
    /// Per-record failures are logged and counted but never abort the rest
    /// of the sweep; a failed record stays in place for the next pass.
    pub async fn sweep_once(&self) -> Result<SweepOutcome, SnapguardError> {
        let due = self.repository.list_due_for_deletion(Utc::now())?;
        let mut outcome = SweepOutcome {
            examined: due.len(),
            ..SweepOutcome::default()
        };

        for record in due {
            match self.delete_record(&record).await {
                Ok(()) => outcome.deleted += 1,
                Err(e) => {
                    warn!(id = %record.id, error = %e, "Failed to delete expired record");
                    outcome.failures += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Make a record eligible for the very next sweep.
    ///
    /// Returns false when the record does not exist (already deleted,
    /// benign when racing the sweep or a user delete).
    pub fn mark_immediate(&self, id: Uuid) -> Result<bool, SnapguardError> {
        let marked = self.repository.mark_for_immediate_deletion(id, Utc::now())?;
        if marked {
            info!(id = %id, "Record marked for immediate deletion");
        } else {
            debug!(id = %id, "Record already gone, nothing to mark");
        }
        Ok(marked)
    }

    /// Pending deletions ordered by ascending deletion date, for
    /// observability.
    pub fn list_scheduled(&self) -> Result<Vec<ScanRecord>, SnapguardError> {
        self.repository.list_scheduled()
    }

    async fn delete_record(&self, record: &ScanRecord) -> Result<(), SnapguardError> {
        match tokio::fs::remove_file(&record.screenshot_path).await {
            Ok(()) => info!(path = %record.screenshot_path, "Deleted screenshot file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %record.screenshot_path, "File already absent")
            }
            Err(e) => return Err(e.into()),
        }

        if self.repository.delete(record.id)? {
            info!(id = %record.id, "Deleted scan record");
        } else {
            debug!(id = %record.id, "Record already deleted");
        }
        Ok(())
    }
}

/// Deletion date `hours` from now, used when scheduling with the default
/// grace period.
pub fn deletion_date_after_hours(hours: i64) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::hours(hours)
}
