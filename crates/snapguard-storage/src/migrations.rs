//! Database schema migrations.
//!
//! Applies the initial schema: the scan_records table and its indexes,
//! tracked through a schema_migrations table.

use rusqlite::Connection;
use tracing::info;

use snapguard_core::error::SnapguardError;

/// Run all pending database migrations.
///
/// Currently implements the initial schema (version 1). Future migrations
/// can be added by checking the current version and applying incremental
/// changes.
pub fn run_migrations(conn: &Connection) -> Result<(), SnapguardError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| SnapguardError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| SnapguardError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
///
/// The partial unique index on pending paths enforces the correlation
/// invariant: at most one pending record per screenshot path.
fn apply_v1(conn: &Connection) -> Result<(), SnapguardError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS scan_records (
            id                  TEXT PRIMARY KEY NOT NULL,
            screenshot_path     TEXT NOT NULL,
            image_url           TEXT NOT NULL,
            rules_text          TEXT NOT NULL,
            classification      TEXT,
            sensitivity_rating  INTEGER,
            should_be_deleted   INTEGER,
            deletion_date       INTEGER,
            reasoning           TEXT,
            status              TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'completed', 'failed')),
            failure_reason      TEXT
                                CHECK (failure_reason IS NULL OR failure_reason IN
                                       ('timeout', 'engine_crash', 'malformed_verdict')),
            created_at          INTEGER NOT NULL,
            processed_at        INTEGER
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_scan_records_pending_path
            ON scan_records (screenshot_path)
            WHERE status = 'pending';

        CREATE INDEX IF NOT EXISTS idx_scan_records_created
            ON scan_records (created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_scan_records_deletion_due
            ON scan_records (deletion_date ASC)
            WHERE should_be_deleted = 1 AND deletion_date IS NOT NULL;

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| SnapguardError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
