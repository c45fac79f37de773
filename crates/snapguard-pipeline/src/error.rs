//! Error types for the lifecycle pipeline.

use snapguard_core::error::SnapguardError;

use crate::stage::ScanStage;

/// Errors from pipeline coordination.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("A pending scan already exists for path: {0}")]
    DuplicatePending(String),
    #[error("Invalid stage transition: {0} -> {1}")]
    InvalidTransition(ScanStage, ScanStage),
    #[error("Storage error: {0}")]
    Storage(#[from] SnapguardError),
}
