//! Lifecycle orchestrator.
//!
//! Coordinates the full per-file pipeline from detection through dedup,
//! stabilization, copy, upload, record creation, classification, and
//! verdict merge. Every detected file runs in its own task; a single
//! file's failure never stops detection or processing of other files.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use snapguard_classify::Classifier;
use snapguard_storage::ScanRepository;
use snapguard_upload::{local_fallback_url, UploadChain};
use snapguard_watch::wait_for_stable;

use crate::correlator::Correlator;
use crate::dedup::DedupSet;
use crate::stage::{validate_transition, ScanStage};

/// Tunables for the orchestrator, derived from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Managed storage area screenshots are copied into.
    pub storage_dir: PathBuf,
    /// Host for the degraded local URL when every upload backend fails.
    pub fallback_host: String,
    /// Ruleset snapshot attached to every scan this orchestrator opens.
    pub rules_text: String,
    /// Quiet period a file's size must hold before it is copied.
    pub quiet_period: Duration,
    /// Number of stabilization probes.
    pub stability_checks: u32,
    /// Dedup set bounds.
    pub dedup_capacity: usize,
    pub dedup_ttl: Duration,
}

/// Orchestrator driving one pipeline run per detected file.
pub struct Orchestrator {
    correlator: Correlator,
    upload_chain: UploadChain,
    classifier: Arc<dyn Classifier>,
    settings: PipelineSettings,
    dedup: Mutex<DedupSet>,
}

impl Orchestrator {
    pub fn new(
        repository: Arc<ScanRepository>,
        upload_chain: UploadChain,
        classifier: Arc<dyn Classifier>,
        settings: PipelineSettings,
    ) -> Self {
        let dedup = Mutex::new(DedupSet::new(settings.dedup_capacity, settings.dedup_ttl));
        Self {
            correlator: Correlator::new(repository),
            upload_chain,
            classifier,
            settings,
            dedup,
        }
    }

    /// Consume detection events, spawning an independent pipeline task per
    /// file. Returns when the event channel closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<PathBuf>) {
        while let Some(path) = events.recv().await {
            let orchestrator = Arc::clone(&self);
            tokio::spawn(async move {
                let stage = orchestrator.handle_detection(&path).await;
                debug!(path = %path.display(), stage = %stage, "Pipeline run finished");
            });
        }
    }

    /// Run the full state machine for one detected file and return the
    /// terminal stage. Nothing here is fatal to the process.
    pub async fn handle_detection(&self, path: &Path) -> ScanStage {
        let stage = ScanStage::Detected;

        // Dedup before any side effect: at most one pipeline run per
        // physical path, even when detection fires twice. The guard is
        // dropped before the first await.
        {
            let mut dedup = match self.dedup.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if !dedup.check_and_insert(path) {
                debug!(path = %path.display(), "Duplicate detection, skipping");
                return self.advance(stage, ScanStage::DuplicateSkip);
            }
        }

        info!(path = %path.display(), "Processing screenshot");

        // Stabilize: the file must exist, be non-empty, and stop growing.
        if wait_for_stable(path, self.settings.quiet_period, self.settings.stability_checks)
            .await
            .is_none()
        {
            debug!(path = %path.display(), "File vanished or never stabilized, aborting");
            return self.advance(stage, ScanStage::Failed);
        }

        // Copy into managed storage under a collision-free name.
        let stored = match self.copy_to_storage(path).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to copy screenshot");
                return self.advance(stage, ScanStage::Failed);
            }
        };
        let stage = self.advance(stage, ScanStage::Copied);
        let stored_str = stored.to_string_lossy().to_string();

        // Upload, degrading to a local URL when the chain is exhausted.
        let image_url = match self.upload_chain.upload(&stored).await {
            Ok(url) => url,
            Err(e) => {
                let file_name = stored
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let url = local_fallback_url(&self.settings.fallback_host, &file_name);
                warn!(
                    error = %e,
                    url = %url,
                    "Falling back to local URL, classification may fail"
                );
                url
            }
        };
        let stage = self.advance(stage, ScanStage::Uploaded);

        // Open the pending record before classification starts.
        if let Err(e) =
            self.correlator
                .open_scan(&stored_str, &image_url, &self.settings.rules_text)
        {
            warn!(path = %stored_str, error = %e, "Failed to open scan");
            return self.advance(stage, ScanStage::Failed);
        }
        let stage = self.advance(stage, ScanStage::Recorded);

        let stage = self.advance(stage, ScanStage::Classifying);
        match self
            .classifier
            .classify(&image_url, &self.settings.rules_text)
            .await
        {
            Ok(verdict) => match self.correlator.merge_result(&stored_str, &verdict) {
                Ok(_) => self.advance(stage, ScanStage::Done),
                Err(e) => {
                    error!(path = %stored_str, error = %e, "Failed to merge verdict");
                    self.advance(stage, ScanStage::Failed)
                }
            },
            Err(e) => {
                warn!(path = %stored_str, error = %e, "Classification failed");
                if let Err(fail_err) =
                    self.correlator.fail_scan(&stored_str, e.failure_reason())
                {
                    error!(path = %stored_str, error = %fail_err, "Failed to record scan failure");
                }
                self.advance(stage, ScanStage::Failed)
            }
        }
    }

    async fn copy_to_storage(&self, path: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.settings.storage_dir).await?;

        let file_name = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("screenshot-{}.{}", Uuid::new_v4(), ext),
            None => format!("screenshot-{}", Uuid::new_v4()),
        };
        let dest = self.settings.storage_dir.join(file_name);
        tokio::fs::copy(path, &dest).await?;

        debug!(from = %path.display(), to = %dest.display(), "Screenshot copied");
        Ok(dest)
    }

    fn advance(&self, from: ScanStage, to: ScanStage) -> ScanStage {
        if let Err(e) = validate_transition(from, to) {
            error!(error = %e, "Stage machine violation");
        }
        to
    }
}
