//! Correlation between the detection and classification phases.
//!
//! A scan is opened as a pending record at detection time and completed by
//! a second call when the asynchronous verdict arrives, matched by the
//! screenshot's storage path. The orchestrator sequences the two calls per
//! file; the correlator enforces the unique-pending-path invariant and
//! absorbs record-not-found races.

use std::sync::Arc;

use tracing::{info, warn};

use snapguard_core::error::SnapguardError;
use snapguard_core::types::{FailureReason, NewScanRecord, ScanRecord, Verdict};
use snapguard_storage::ScanRepository;

use crate::error::PipelineError;

pub struct Correlator {
    repository: Arc<ScanRepository>,
}

impl Correlator {
    pub fn new(repository: Arc<ScanRepository>) -> Self {
        Self { repository }
    }

    /// Insert a new pending scan record for a detected screenshot.
    ///
    /// A second open for a path whose first scan is still pending is
    /// rejected with `DuplicatePending` rather than creating a second
    /// pending row. The repository's partial unique index backs this up
    /// when two opens race past the pre-check.
    pub fn open_scan(
        &self,
        path: &str,
        image_url: &str,
        rules_text: &str,
    ) -> Result<ScanRecord, PipelineError> {
        if self.repository.find_pending_by_path(path)?.is_some() {
            return Err(PipelineError::DuplicatePending(path.to_string()));
        }

        let new_record = NewScanRecord {
            screenshot_path: path.to_string(),
            image_url: image_url.to_string(),
            rules_text: rules_text.to_string(),
        };

        match self.repository.create(&new_record) {
            Ok(record) => {
                info!(path = %path, id = %record.id, "Scan opened");
                Ok(record)
            }
            Err(SnapguardError::Storage(msg)) if msg.contains("UNIQUE constraint") => {
                Err(PipelineError::DuplicatePending(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Merge a verdict into the pending record for `path`.
    ///
    /// Returns `None` (after logging) when no pending record matches: the
    /// record was deleted while classification ran, or the scan was never
    /// opened. That outcome is benign and never fails the pipeline.
    pub fn merge_result(
        &self,
        path: &str,
        verdict: &Verdict,
    ) -> Result<Option<ScanRecord>, PipelineError> {
        match self.repository.complete_scan(path, verdict)? {
            Some(record) => {
                info!(
                    path = %path,
                    classification = %verdict.classification,
                    rating = verdict.sensitivity_rating,
                    "Scan completed"
                );
                Ok(Some(record))
            }
            None => {
                warn!(path = %path, "No pending scan record to merge verdict into");
                Ok(None)
            }
        }
    }

    /// Mark the pending record for `path` as failed with a reason code.
    ///
    /// Like `merge_result`, a missing pending record is benign.
    pub fn fail_scan(
        &self,
        path: &str,
        reason: FailureReason,
    ) -> Result<Option<ScanRecord>, PipelineError> {
        match self.repository.fail_scan(path, reason)? {
            Some(record) => {
                warn!(path = %path, reason = %reason, "Scan failed");
                Ok(Some(record))
            }
            None => {
                warn!(path = %path, "No pending scan record to mark failed");
                Ok(None)
            }
        }
    }
}
