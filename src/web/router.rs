//! Router configuration for both HTTP tiers.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers::{codebase, health_check, storage, ApiState, StorageState};
use super::middleware::create_cors_layer;

/// Create the public API tier router.
pub fn create_api_router(
    state: Arc<ApiState>,
    cors_origins: &[String],
    max_upload_bytes: usize,
) -> Router {
    let upload_routes = Router::new()
        .route("/upload", post(codebase::upload_codebase))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    let codebase_routes = Router::new()
        .route("/codebases", get(codebase::list_codebases))
        .route("/codebases/:id", get(codebase::get_codebase))
        .route("/codebases/:id/content", get(codebase::get_file_content))
        .route("/codebases/:id/download", get(codebase::download_file))
        .route("/codebases/:id/zip", get(codebase::download_zip));

    Router::new()
        .merge(upload_routes)
        .merge(codebase_routes)
        .with_state(state)
        .merge(create_health_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
}

/// Create the internal storage tier router.
pub fn create_storage_router(state: Arc<StorageState>, max_upload_bytes: usize) -> Router {
    let store_routes = Router::new()
        .route("/store", post(storage::store_files))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    let read_routes = Router::new()
        .route("/store/:id", delete(storage::delete_codebase))
        .route("/content/:id", get(storage::get_content))
        .route("/download/:id", get(storage::download_file))
        .route("/zip/:id", get(storage::download_zip))
        .route("/files/:id", get(storage::list_files))
        .route("/codebases", get(storage::list_stored_codebases));

    Router::new()
        .merge(store_routes)
        .merge(read_routes)
        .with_state(state)
        .merge(create_health_router())
        .layer(TraceLayer::new_for_http())
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Serve a static frontend from `static_path` as the router fallback.
///
/// The router is returned unchanged if the directory does not exist.
pub fn with_static_fallback(router: Router, static_path: &str) -> Router {
    if !Path::new(static_path).is_dir() {
        tracing::warn!("Static path {} does not exist, not serving static files", static_path);
        return router;
    }
    tracing::info!("Serving static files from {}", static_path);
    router.fallback_service(ServeDir::new(static_path))
}
