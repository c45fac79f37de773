//! Route handler functions for all API endpoints.
//!
//! Handlers extract parameters via axum extractors, interact with the
//! repository through AppState, and return JSON responses. The delete
//! handlers tolerate a record or file that is already gone, since user
//! deletions can race the retention sweep.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use snapguard_core::types::ScanRecord;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub total_scans: u64,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub message: String,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let total_scans = state.repository.count()?;
    Ok(Json(HealthResponse {
        status: "OK".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        total_scans,
    }))
}

/// GET /api/scans - all scan records, newest first.
pub async fn list_scans(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScanRecord>>, ApiError> {
    Ok(Json(state.repository.list_all()?))
}

/// GET /api/scans/scheduled - pending deletions, earliest first.
pub async fn list_scheduled(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScanRecord>>, ApiError> {
    Ok(Json(state.repository.list_scheduled()?))
}

/// DELETE /api/scans/{id} - remove the record and its on-disk file now,
/// bypassing the retention schedule.
pub async fn delete_scan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, ApiError> {
    let record = state
        .repository
        .find_by_id(id)?
        .ok_or_else(|| ApiError::NotFound(format!("Scan record not found: {}", id)))?;

    match tokio::fs::remove_file(&record.screenshot_path).await {
        Ok(()) => info!(path = %record.screenshot_path, "Deleted screenshot file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %record.screenshot_path, "File already absent")
        }
        Err(e) => {
            warn!(path = %record.screenshot_path, error = %e, "Failed to delete screenshot file")
        }
    }

    // The sweep may have taken the record since we fetched it; either way
    // it is gone now.
    state.repository.delete(id)?;
    info!(id = %id, "Scan record deleted");

    Ok(Json(ActionResponse {
        message: "Record deleted".to_string(),
    }))
}

/// POST /api/scans/{id}/delete-now - flag the record so the very next
/// retention sweep erases it.
pub async fn mark_delete_now(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, ApiError> {
    let marked = state.repository.mark_for_immediate_deletion(id, Utc::now())?;
    if !marked {
        return Err(ApiError::NotFound(format!("Scan record not found: {}", id)));
    }
    Ok(Json(ActionResponse {
        message: "Record scheduled for immediate deletion".to_string(),
    }))
}
