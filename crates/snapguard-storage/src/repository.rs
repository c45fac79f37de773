//! Repository for scan records.
//!
//! All pipeline, retention, and API access to scan_records goes through
//! ScanRepository. The find-then-update sequences run inside a single
//! `with_conn` closure, so the connection mutex makes them atomic with
//! respect to concurrent callers.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use snapguard_core::error::SnapguardError;
use snapguard_core::types::{FailureReason, NewScanRecord, ScanRecord, ScanStatus, Verdict};

use crate::db::Database;

/// Repository for scan record CRUD.
pub struct ScanRepository {
    db: Arc<Database>,
}

const RECORD_COLUMNS: &str = "id, screenshot_path, image_url, rules_text, classification, \
     sensitivity_rating, should_be_deleted, deletion_date, reasoning, status, \
     failure_reason, created_at, processed_at";

impl ScanRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new pending scan record and return it with its assigned id.
    ///
    /// The partial unique index on pending paths rejects a second pending
    /// row for the same screenshot path; the resulting error message
    /// carries the UNIQUE constraint text for callers that treat the
    /// duplicate case specially.
    pub fn create(&self, new: &NewScanRecord) -> Result<ScanRecord, SnapguardError> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO scan_records (id, screenshot_path, image_url, rules_text, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
                rusqlite::params![
                    id.to_string(),
                    new.screenshot_path,
                    new.image_url,
                    new.rules_text,
                    created_at.timestamp(),
                ],
            )
            .map_err(|e| SnapguardError::Storage(format!("Failed to create scan record: {}", e)))?;

            fetch_by_id(conn, id)?.ok_or_else(|| {
                SnapguardError::Storage("Created record not found on readback".to_string())
            })
        })
    }

    /// Find a record by id.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<ScanRecord>, SnapguardError> {
        self.db.with_conn(|conn| fetch_by_id(conn, id))
    }

    /// Find the single pending record for a screenshot path, if any.
    pub fn find_pending_by_path(&self, path: &str) -> Result<Option<ScanRecord>, SnapguardError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM scan_records WHERE screenshot_path = ?1 AND status = 'pending'",
                    RECORD_COLUMNS
                ))
                .map_err(|e| SnapguardError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![path], |row| Ok(row_to_scan_record(row)))
                .optional()
                .map_err(|e| SnapguardError::Storage(e.to_string()))?;

            match result {
                Some(record) => Ok(Some(record?)),
                None => Ok(None),
            }
        })
    }

    /// Merge a classification verdict into the pending record for `path`,
    /// setting status to completed and stamping processed_at.
    ///
    /// Returns the updated record, or `None` when no pending record matches
    /// (the record was deleted, or the scan was never opened). Completed
    /// records are never touched, which keeps their classification fields
    /// immutable.
    pub fn complete_scan(
        &self,
        path: &str,
        verdict: &Verdict,
    ) -> Result<Option<ScanRecord>, SnapguardError> {
        let processed_at = Utc::now();

        self.db.with_conn(|conn| {
            let id = match pending_id_for_path(conn, path)? {
                Some(id) => id,
                None => return Ok(None),
            };

            conn.execute(
                "UPDATE scan_records
                 SET classification = ?1, sensitivity_rating = ?2, should_be_deleted = ?3,
                     deletion_date = ?4, reasoning = ?5, processed_at = ?6, status = 'completed'
                 WHERE id = ?7",
                rusqlite::params![
                    verdict.classification,
                    verdict.sensitivity_rating,
                    verdict.should_be_deleted as i64,
                    verdict.deletion_date.map(|d| d.timestamp()),
                    verdict.reasoning,
                    processed_at.timestamp(),
                    id.to_string(),
                ],
            )
            .map_err(|e| SnapguardError::Storage(format!("Failed to merge verdict: {}", e)))?;

            fetch_by_id(conn, id)
        })
    }

    /// Mark the pending record for `path` as failed with a reason code.
    ///
    /// Returns the updated record, or `None` when no pending record matches.
    pub fn fail_scan(
        &self,
        path: &str,
        reason: FailureReason,
    ) -> Result<Option<ScanRecord>, SnapguardError> {
        let processed_at = Utc::now();

        self.db.with_conn(|conn| {
            let id = match pending_id_for_path(conn, path)? {
                Some(id) => id,
                None => return Ok(None),
            };

            conn.execute(
                "UPDATE scan_records
                 SET status = 'failed', failure_reason = ?1, processed_at = ?2
                 WHERE id = ?3",
                rusqlite::params![reason.to_string(), processed_at.timestamp(), id.to_string()],
            )
            .map_err(|e| SnapguardError::Storage(format!("Failed to fail scan: {}", e)))?;

            fetch_by_id(conn, id)
        })
    }

    /// Delete a record by id. Returns whether a row was removed.
    pub fn delete(&self, id: Uuid) -> Result<bool, SnapguardError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "DELETE FROM scan_records WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                )
                .map_err(|e| SnapguardError::Storage(format!("Failed to delete record: {}", e)))?;
            Ok(changed > 0)
        })
    }

    /// List all records, newest first.
    pub fn list_all(&self) -> Result<Vec<ScanRecord>, SnapguardError> {
        self.query_records(
            &format!(
                "SELECT {} FROM scan_records ORDER BY created_at DESC, rowid DESC",
                RECORD_COLUMNS
            ),
            rusqlite::params![],
        )
    }

    /// List records whose scheduled deletion is due at `now`.
    pub fn list_due_for_deletion(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScanRecord>, SnapguardError> {
        self.query_records(
            &format!(
                "SELECT {} FROM scan_records
                 WHERE should_be_deleted = 1 AND deletion_date IS NOT NULL AND deletion_date <= ?1",
                RECORD_COLUMNS
            ),
            rusqlite::params![now.timestamp()],
        )
    }

    /// List records scheduled for deletion, earliest deletion date first.
    pub fn list_scheduled(&self) -> Result<Vec<ScanRecord>, SnapguardError> {
        self.query_records(
            &format!(
                "SELECT {} FROM scan_records
                 WHERE should_be_deleted = 1 AND deletion_date IS NOT NULL
                 ORDER BY deletion_date ASC",
                RECORD_COLUMNS
            ),
            rusqlite::params![],
        )
    }

    /// Make a record eligible for the next sweep by setting its deletion
    /// date to `now`. Returns whether the record existed.
    pub fn mark_for_immediate_deletion(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, SnapguardError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE scan_records SET should_be_deleted = 1, deletion_date = ?1 WHERE id = ?2",
                    rusqlite::params![now.timestamp(), id.to_string()],
                )
                .map_err(|e| {
                    SnapguardError::Storage(format!("Failed to mark for deletion: {}", e))
                })?;
            Ok(changed > 0)
        })
    }

    /// Count all records.
    pub fn count(&self) -> Result<u64, SnapguardError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM scan_records", [], |row| row.get(0))
                .map_err(|e| SnapguardError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ScanRecord>, SnapguardError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| SnapguardError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(params, |row| Ok(row_to_scan_record(row)))
                .map_err(|e| SnapguardError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let record = row.map_err(|e| SnapguardError::Storage(e.to_string()))??;
                records.push(record);
            }
            Ok(records)
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn pending_id_for_path(
    conn: &rusqlite::Connection,
    path: &str,
) -> Result<Option<Uuid>, SnapguardError> {
    let id: Option<String> = conn
        .query_row(
            "SELECT id FROM scan_records WHERE screenshot_path = ?1 AND status = 'pending'",
            rusqlite::params![path],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| SnapguardError::Storage(e.to_string()))?;

    match id {
        Some(id) => Ok(Some(Uuid::parse_str(&id).map_err(|e| {
            SnapguardError::Storage(format!("Invalid UUID: {}", e))
        })?)),
        None => Ok(None),
    }
}

fn fetch_by_id(
    conn: &rusqlite::Connection,
    id: Uuid,
) -> Result<Option<ScanRecord>, SnapguardError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM scan_records WHERE id = ?1",
            RECORD_COLUMNS
        ))
        .map_err(|e| SnapguardError::Storage(e.to_string()))?;

    let result = stmt
        .query_row(rusqlite::params![id.to_string()], |row| {
            Ok(row_to_scan_record(row))
        })
        .optional()
        .map_err(|e| SnapguardError::Storage(e.to_string()))?;

    match result {
        Some(record) => Ok(Some(record?)),
        None => Ok(None),
    }
}

fn row_to_scan_record(row: &rusqlite::Row<'_>) -> Result<ScanRecord, SnapguardError> {
    let id_str: String = row.get(0).map_err(|e| SnapguardError::Storage(e.to_string()))?;
    let screenshot_path: String =
        row.get(1).map_err(|e| SnapguardError::Storage(e.to_string()))?;
    let image_url: String = row.get(2).map_err(|e| SnapguardError::Storage(e.to_string()))?;
    let rules_text: String = row.get(3).map_err(|e| SnapguardError::Storage(e.to_string()))?;
    let classification: Option<String> =
        row.get(4).map_err(|e| SnapguardError::Storage(e.to_string()))?;
    let sensitivity_rating: Option<i64> =
        row.get(5).map_err(|e| SnapguardError::Storage(e.to_string()))?;
    let should_be_deleted: Option<i64> =
        row.get(6).map_err(|e| SnapguardError::Storage(e.to_string()))?;
    let deletion_date: Option<i64> =
        row.get(7).map_err(|e| SnapguardError::Storage(e.to_string()))?;
    let reasoning: Option<String> =
        row.get(8).map_err(|e| SnapguardError::Storage(e.to_string()))?;
    let status_str: String = row.get(9).map_err(|e| SnapguardError::Storage(e.to_string()))?;
    let failure_reason_str: Option<String> =
        row.get(10).map_err(|e| SnapguardError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(11).map_err(|e| SnapguardError::Storage(e.to_string()))?;
    let processed_at: Option<i64> =
        row.get(12).map_err(|e| SnapguardError::Storage(e.to_string()))?;

    let status: ScanStatus = status_str
        .parse()
        .map_err(SnapguardError::Storage)?;

    let failure_reason: Option<FailureReason> = match failure_reason_str {
        Some(s) => Some(s.parse().map_err(SnapguardError::Storage)?),
        None => None,
    };

    Ok(ScanRecord {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| SnapguardError::Storage(format!("Invalid UUID: {}", e)))?,
        screenshot_path,
        image_url,
        rules_text,
        classification,
        sensitivity_rating,
        should_be_deleted: should_be_deleted.map(|v| v != 0),
        deletion_date: deletion_date.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        reasoning,
        status,
        failure_reason,
        created_at: Utc.timestamp_opt(created_at, 0).single().unwrap_or_default(),
        processed_at: processed_at.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
    })
}

/// Extension trait for rusqlite to support optional query results.
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
