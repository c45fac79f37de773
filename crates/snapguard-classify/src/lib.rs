//! Snapguard classify crate - invocation of the external sensitivity engine.
//!
//! The engine is an opaque, long-running, out-of-process task: it receives
//! an image URL plus a ruleset and produces a structured verdict, or fails.
//! This crate provides the Classifier trait, the real EngineInvoker (staged
//! process invocation with a wall-clock timeout), a tolerant verdict parser,
//! and a mock for tests.

pub mod invoker;
pub mod verdict;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use snapguard_core::error::SnapguardError;
use snapguard_core::types::{FailureReason, Verdict};

pub use invoker::EngineInvoker;
pub use verdict::parse_verdict;

/// Errors from a classification attempt.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Classification timed out after {0} seconds")]
    Timeout(u64),
    #[error("Classification engine failed ({status}): {stderr}")]
    EngineFailed { status: String, stderr: String },
    #[error("Malformed verdict: {0}")]
    MalformedVerdict(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClassifyError {
    /// Reason code recorded on the scan record when this error ends the
    /// file's pipeline.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            ClassifyError::Timeout(_) => FailureReason::Timeout,
            ClassifyError::EngineFailed { .. } | ClassifyError::Io(_) => {
                FailureReason::EngineCrash
            }
            ClassifyError::MalformedVerdict(_) | ClassifyError::Serialization(_) => {
                FailureReason::MalformedVerdict
            }
        }
    }
}

impl From<ClassifyError> for SnapguardError {
    fn from(err: ClassifyError) -> Self {
        SnapguardError::Classify(err.to_string())
    }
}

/// Service that classifies an image against a ruleset.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image_url: &str, rules_text: &str)
        -> Result<Verdict, ClassifyError>;
}

/// Scripted outcome for the mock classifier.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Verdict(Verdict),
    Timeout,
    EngineCrash,
    Malformed,
}

/// Mock classifier for testing pipelines without a real engine.
pub struct MockClassifier {
    outcome: MockOutcome,
    calls: AtomicUsize,
}

impl MockClassifier {
    pub fn new(outcome: MockOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(
        &self,
        _image_url: &str,
        _rules_text: &str,
    ) -> Result<Verdict, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            MockOutcome::Verdict(v) => Ok(v.clone()),
            MockOutcome::Timeout => Err(ClassifyError::Timeout(120)),
            MockOutcome::EngineCrash => Err(ClassifyError::EngineFailed {
                status: "exit status: 1".to_string(),
                stderr: "mock crash".to_string(),
            }),
            MockOutcome::Malformed => {
                Err(ClassifyError::MalformedVerdict("mock".to_string()))
            }
        }
    }
}
