//! Integration tests for the API surface, driving the router directly.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use tower::ServiceExt;
use uuid::Uuid;

use snapguard_api::{create_router, AppState};
use snapguard_core::types::{NewScanRecord, Verdict};
use snapguard_storage::{Database, ScanRepository};

fn make_state(uploads_dir: &Path) -> (AppState, Arc<ScanRepository>) {
    let repository = Arc::new(ScanRepository::new(Arc::new(Database::in_memory().unwrap())));
    let state = AppState::new(Arc::clone(&repository), uploads_dir.to_path_buf());
    (state, repository)
}

fn seed_record(repository: &ScanRepository, path: &Path) -> Uuid {
    repository
        .create(&NewScanRecord {
            screenshot_path: path.to_string_lossy().to_string(),
            image_url: "https://images.example/x.png".to_string(),
            rules_text: "# Rules".to_string(),
        })
        .unwrap()
        .id
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _) = make_state(dir.path());
    let router = create_router(state);

    let response = router
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "OK");
    assert_eq!(json["total_scans"], 0);
}

#[tokio::test]
async fn test_list_scans_empty() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _) = make_state(dir.path());
    let router = create_router(state);

    let response = router
        .oneshot(Request::get("/api/scans").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_list_scans_returns_records() {
    let dir = tempfile::tempdir().unwrap();
    let (state, repository) = make_state(dir.path());
    seed_record(&repository, &dir.path().join("a.png"));
    seed_record(&repository, &dir.path().join("b.png"));

    let router = create_router(state);
    let response = router
        .oneshot(Request::get("/api/scans").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let scans = json.as_array().unwrap();
    assert_eq!(scans.len(), 2);
    // Newest first.
    assert!(scans[0]["screenshot_path"]
        .as_str()
        .unwrap()
        .ends_with("b.png"));
    assert_eq!(scans[0]["status"], "pending");
}

#[tokio::test]
async fn test_delete_scan_removes_record_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("screenshot-del.png");
    std::fs::write(&file, b"bytes").unwrap();

    let (state, repository) = make_state(dir.path());
    let id = seed_record(&repository, &file);

    let router = create_router(state);
    let response = router
        .oneshot(
            Request::delete(format!("/api/scans/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(!file.exists());
    assert!(repository.find_by_id(id).unwrap().is_none());
}

#[tokio::test]
async fn test_delete_scan_tolerates_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let (state, repository) = make_state(dir.path());
    // File never written.
    let id = seed_record(&repository, &dir.path().join("gone.png"));

    let router = create_router(state);
    let response = router
        .oneshot(
            Request::delete(format!("/api/scans/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(repository.find_by_id(id).unwrap().is_none());
}

#[tokio::test]
async fn test_delete_scan_missing_record_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _) = make_state(dir.path());

    let router = create_router(state);
    let response = router
        .oneshot(
            Request::delete(format!("/api/scans/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_mark_delete_now_makes_record_due() {
    let dir = tempfile::tempdir().unwrap();
    let (state, repository) = make_state(dir.path());
    let id = seed_record(&repository, &dir.path().join("soon.png"));

    let router = create_router(state);
    let response = router
        .oneshot(
            Request::post(format!("/api/scans/{}/delete-now", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let due = repository.list_due_for_deletion(Utc::now()).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, id);
}

#[tokio::test]
async fn test_mark_delete_now_missing_record_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _) = make_state(dir.path());

    let router = create_router(state);
    let response = router
        .oneshot(
            Request::post(format!("/api/scans/{}/delete-now", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_scheduled_ordering() {
    let dir = tempfile::tempdir().unwrap();
    let (state, repository) = make_state(dir.path());

    let later = dir.path().join("later.png");
    let sooner = dir.path().join("sooner.png");
    for (path, hours) in [(&later, 48), (&sooner, 1)] {
        seed_record(&repository, path);
        repository
            .complete_scan(
                &path.to_string_lossy(),
                &Verdict {
                    classification: "confidential".to_string(),
                    sensitivity_rating: 9,
                    should_be_deleted: true,
                    deletion_date: Some(Utc::now() + Duration::hours(hours)),
                    reasoning: String::new(),
                },
            )
            .unwrap();
    }

    let router = create_router(state);
    let response = router
        .oneshot(
            Request::get("/api/scans/scheduled")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let scheduled = json.as_array().unwrap();
    assert_eq!(scheduled.len(), 2);
    assert!(scheduled[0]["screenshot_path"]
        .as_str()
        .unwrap()
        .ends_with("sooner.png"));
}

#[tokio::test]
async fn test_uploads_static_serving() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("screenshot-x.png"), b"image bytes").unwrap();

    let (state, _) = make_state(dir.path());
    let router = create_router(state);

    let response = router
        .oneshot(
            Request::get("/uploads/screenshot-x.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
