//! Core domain types for the screenshot lifecycle pipeline.
//!
//! Defines scan records, classification verdicts, and their supporting
//! enumerations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Lifecycle status of a scan record.
///
/// `Pending` means the screenshot was detected and queued but no verdict has
/// arrived yet. `Completed` means the classification result was merged in.
/// `Failed` means the classification attempt ended in timeout, crash, or an
/// unparseable result; the reason is recorded on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStatus::Pending => write!(f, "pending"),
            ScanStatus::Completed => write!(f, "completed"),
            ScanStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ScanStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            _ => Err(format!("Unknown scan status: {}", s)),
        }
    }
}

/// Reason code attached to a record that reached `ScanStatus::Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    EngineCrash,
    MalformedVerdict,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::EngineCrash => write!(f, "engine_crash"),
            FailureReason::MalformedVerdict => write!(f, "malformed_verdict"),
        }
    }
}

impl std::str::FromStr for FailureReason {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeout" => Ok(FailureReason::Timeout),
            "engine_crash" => Ok(FailureReason::EngineCrash),
            "malformed_verdict" => Ok(FailureReason::MalformedVerdict),
            _ => Err(format!("Unknown failure reason: {}", s)),
        }
    }
}

// =============================================================================
// Domain structs
// =============================================================================

/// A persisted scan record: the unit of work and of retention.
///
/// The `screenshot_path` is the correlation key between the detection phase
/// and the asynchronous classification result: while a record is pending it
/// is the only pending record with that path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: Uuid,
    /// Absolute path of the locally retained copy of the image.
    pub screenshot_path: String,
    /// Dereferenceable URL handed to the classifier. May be a degraded
    /// local fallback when every upload backend failed.
    pub image_url: String,
    /// Snapshot of the ruleset in force when this scan was queued.
    pub rules_text: String,
    pub classification: Option<String>,
    pub sensitivity_rating: Option<i64>,
    pub should_be_deleted: Option<bool>,
    /// Earliest instant the retention sweep may erase the record and its
    /// file, meaningful only together with `should_be_deleted = true`.
    pub deletion_date: Option<DateTime<Utc>>,
    pub reasoning: Option<String>,
    pub status: ScanStatus,
    pub failure_reason: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Fields supplied when opening a new pending scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScanRecord {
    pub screenshot_path: String,
    pub image_url: String,
    pub rules_text: String,
}

/// Structured output of the external classification engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub classification: String,
    /// 0-10 sensitivity score.
    pub sensitivity_rating: i64,
    pub should_be_deleted: bool,
    pub deletion_date: Option<DateTime<Utc>>,
    pub reasoning: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_status_display() {
        assert_eq!(ScanStatus::Pending.to_string(), "pending");
        assert_eq!(ScanStatus::Completed.to_string(), "completed");
        assert_eq!(ScanStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_scan_status_from_str() {
        assert_eq!("pending".parse::<ScanStatus>().unwrap(), ScanStatus::Pending);
        assert_eq!(
            "completed".parse::<ScanStatus>().unwrap(),
            ScanStatus::Completed
        );
        assert_eq!("failed".parse::<ScanStatus>().unwrap(), ScanStatus::Failed);
        assert!("invalid".parse::<ScanStatus>().is_err());
    }

    #[test]
    fn test_scan_status_serde_round_trip() {
        for variant in [ScanStatus::Pending, ScanStatus::Completed, ScanStatus::Failed] {
            let json = serde_json::to_string(&variant).unwrap();
            let rt: ScanStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(variant, rt);
        }
    }

    #[test]
    fn test_scan_status_display_from_str_round_trip() {
        for variant in [ScanStatus::Pending, ScanStatus::Completed, ScanStatus::Failed] {
            let parsed: ScanStatus = variant.to_string().parse().unwrap();
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn test_failure_reason_display_from_str_round_trip() {
        for variant in [
            FailureReason::Timeout,
            FailureReason::EngineCrash,
            FailureReason::MalformedVerdict,
        ] {
            let parsed: FailureReason = variant.to_string().parse().unwrap();
            assert_eq!(variant, parsed);
        }
        assert!("bogus".parse::<FailureReason>().is_err());
    }

    #[test]
    fn test_failure_reason_serde_json_format() {
        assert_eq!(
            serde_json::to_string(&FailureReason::EngineCrash).unwrap(),
            "\"engine_crash\""
        );
        assert_eq!(
            serde_json::to_string(&FailureReason::MalformedVerdict).unwrap(),
            "\"malformed_verdict\""
        );
    }

    #[test]
    fn test_scan_record_serde_round_trip() {
        let record = ScanRecord {
            id: Uuid::new_v4(),
            screenshot_path: "/data/uploads/screenshot-abc.png".to_string(),
            image_url: "https://images.example/abc.png".to_string(),
            rules_text: "# Rules".to_string(),
            classification: Some("confidential".to_string()),
            sensitivity_rating: Some(9),
            should_be_deleted: Some(true),
            deletion_date: Some(Utc::now()),
            reasoning: Some("API keys visible".to_string()),
            status: ScanStatus::Completed,
            failure_reason: None,
            created_at: Utc::now(),
            processed_at: Some(Utc::now()),
        };
        let json = serde_json::to_string(&record).unwrap();
        let rt: ScanRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rt.id, record.id);
        assert_eq!(rt.screenshot_path, record.screenshot_path);
        assert_eq!(rt.classification, record.classification);
        assert_eq!(rt.status, record.status);
    }

    #[test]
    fn test_scan_record_pending_has_null_verdict_fields() {
        let record = ScanRecord {
            id: Uuid::new_v4(),
            screenshot_path: "/data/uploads/screenshot-x.png".to_string(),
            image_url: "http://127.0.0.1:3030/uploads/screenshot-x.png".to_string(),
            rules_text: "rules".to_string(),
            classification: None,
            sensitivity_rating: None,
            should_be_deleted: None,
            deletion_date: None,
            reasoning: None,
            status: ScanStatus::Pending,
            failure_reason: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        let rt: ScanRecord = serde_json::from_str(&json).unwrap();
        assert!(rt.classification.is_none());
        assert!(rt.processed_at.is_none());
        assert_eq!(rt.status, ScanStatus::Pending);
    }

    #[test]
    fn test_verdict_serde_round_trip() {
        let verdict = Verdict {
            classification: "internal".to_string(),
            sensitivity_rating: 6,
            should_be_deleted: false,
            deletion_date: None,
            reasoning: "Org chart screenshot".to_string(),
        };
        let json = serde_json::to_string(&verdict).unwrap();
        let rt: Verdict = serde_json::from_str(&json).unwrap();
        assert_eq!(rt, verdict);
    }
}
