//! Router setup with all API routes and middleware.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
///
/// The managed screenshot directory is served at /uploads so the degraded
/// local image URLs remain dereferenceable on-host. CORS is permissive:
/// the server binds to loopback only and the dashboard dev server runs on
/// a different local port.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/scans", get(handlers::list_scans))
        .route("/api/scans/scheduled", get(handlers::list_scheduled))
        .route("/api/scans/{id}", delete(handlers::delete_scan))
        .route("/api/scans/{id}/delete-now", post(handlers::mark_delete_now))
        .nest_service("/uploads", ServeDir::new(&state.uploads_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server on 127.0.0.1 at the given port.
pub async fn start_server(
    port: u16,
    state: AppState,
) -> Result<(), snapguard_core::error::SnapguardError> {
    let addr = format!("127.0.0.1:{}", port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| snapguard_core::error::SnapguardError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| snapguard_core::error::SnapguardError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
