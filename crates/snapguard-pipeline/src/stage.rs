//! Per-file pipeline stage machine with validated transitions.
//!
//! Enforces the allowed stage transitions for a detected screenshot:
//! Detected -> Copied -> Uploaded -> Recorded -> Classifying -> Done/Failed,
//! with DuplicateSkip as the terminal for repeat detections and Failed
//! reachable from the stages where a file's pipeline can end early.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Stages a detected file moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStage {
    Detected,
    DuplicateSkip,
    Copied,
    Uploaded,
    Recorded,
    Classifying,
    Done,
    Failed,
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStage::Detected => write!(f, "detected"),
            ScanStage::DuplicateSkip => write!(f, "duplicate_skip"),
            ScanStage::Copied => write!(f, "copied"),
            ScanStage::Uploaded => write!(f, "uploaded"),
            ScanStage::Recorded => write!(f, "recorded"),
            ScanStage::Classifying => write!(f, "classifying"),
            ScanStage::Done => write!(f, "done"),
            ScanStage::Failed => write!(f, "failed"),
        }
    }
}

/// Validate that a stage transition is allowed.
///
/// Valid transitions:
/// - Detected -> DuplicateSkip (repeat detection, terminal)
/// - Detected -> Copied
/// - Detected -> Failed (file vanished or stayed empty)
/// - Copied -> Uploaded (degraded upload still counts as uploaded)
/// - Uploaded -> Recorded
/// - Uploaded -> Failed (record creation rejected)
/// - Recorded -> Classifying
/// - Classifying -> Done
/// - Classifying -> Failed
pub fn validate_transition(from: ScanStage, to: ScanStage) -> Result<(), PipelineError> {
    let valid = matches!(
        (from, to),
        (ScanStage::Detected, ScanStage::DuplicateSkip)
            | (ScanStage::Detected, ScanStage::Copied)
            | (ScanStage::Detected, ScanStage::Failed)
            | (ScanStage::Copied, ScanStage::Uploaded)
            | (ScanStage::Uploaded, ScanStage::Recorded)
            | (ScanStage::Uploaded, ScanStage::Failed)
            | (ScanStage::Recorded, ScanStage::Classifying)
            | (ScanStage::Classifying, ScanStage::Done)
            | (ScanStage::Classifying, ScanStage::Failed)
    );

    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidTransition(from, to))
    }
}
