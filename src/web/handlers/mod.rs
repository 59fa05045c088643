//! HTTP handlers for the API tier and the storage tier.

pub mod codebase;
pub mod storage;

use axum::Json;

use super::client::StorageClient;
use super::dto::HealthResponse;
use crate::vault::{BlobStore, CodebaseId, RelativePath};
use crate::Database;

/// Shared state of the API tier.
#[derive(Debug, Clone)]
pub struct ApiState {
    /// Metadata ledger.
    pub db: Database,
    /// Storage tier client.
    pub storage: StorageClient,
}

impl ApiState {
    /// Create a new API state.
    pub fn new(db: Database, storage: StorageClient) -> Self {
        Self { db, storage }
    }
}

/// Shared state of the storage tier.
#[derive(Debug, Clone)]
pub struct StorageState {
    /// On-disk blob store.
    pub store: BlobStore,
}

impl StorageState {
    /// Create a new storage state.
    pub fn new(store: BlobStore) -> Self {
        Self { store }
    }
}

/// GET /health - Liveness probe (both tiers).
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// `{prefix}?file={path}` with the path percent-encoded.
fn download_url(prefix: &str, path: &RelativePath) -> String {
    format!("{prefix}?file={}", urlencoding::encode(path.as_str()))
}

/// Storage tier download link for a file.
pub(crate) fn storage_download_url(id: &CodebaseId, path: &RelativePath) -> String {
    download_url(&format!("/download/{id}"), path)
}

/// API tier download link for a file.
pub(crate) fn api_download_url(id: &CodebaseId, path: &RelativePath) -> String {
    download_url(&format!("/codebases/{id}/download"), path)
}
