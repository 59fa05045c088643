//! API tier handlers.
//!
//! Uploads are recorded in the ledger and forwarded to the storage tier;
//! reads validate their input locally and relay the storage tier's answer.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use super::{api_download_url, ApiState};
use crate::db::CodebaseRepository;
use crate::vault::{sanitize, CodebaseId};
use crate::web::client::{StoreOutcome, UploadPart};
use crate::web::dto::{
    CodebaseListResponse, ContentResponse, FileListResponse, FileQuery, UploadResponse,
    FILES_FIELD, PATH_FIELD_PREFIX,
};
use crate::web::error::{ApiError, ErrorCode};

/// Headers copied from storage tier responses.
const RELAYED_HEADERS: [header::HeaderName; 3] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_DISPOSITION,
];

fn form_error(e: impl std::fmt::Display) -> ApiError {
    tracing::warn!(error = %e, "Failed to read multipart upload");
    ApiError::bad_request("File too large or invalid form data")
}

fn storage_error(e: crate::VaultError) -> ApiError {
    tracing::error!(error = %e, "Storage tier request failed");
    ApiError::internal("An internal error occurred")
}

/// Pass a storage tier response through, streaming its body.
fn relay(upstream: reqwest::Response) -> Response {
    let mut builder = Response::builder().status(upstream.status());
    for name in RELAYED_HEADERS {
        if let Some(value) = upstream.headers().get(&name) {
            builder = builder.header(name, value.clone());
        }
    }

    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .unwrap_or_else(|e| {
            tracing::error!("Failed to build relayed response: {}", e);
            ApiError::internal("An internal error occurred").into_response()
        })
}

/// POST /upload - Upload a batch of files as a new codebase.
///
/// Fields: repeated `files` parts and optional `path_<file name>` relative
/// path overrides.
pub async fn upload_codebase(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut parts: Vec<UploadPart> = Vec::new();
    let mut paths: HashMap<String, String> = HashMap::new();

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == FILES_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content = field.bytes().await.map_err(form_error)?;
            parts.push(UploadPart {
                file_name,
                path: None,
                content,
            });
        } else if let Some(file_name) = name.strip_prefix(PATH_FIELD_PREFIX) {
            let path = field.text().await.map_err(form_error)?;
            paths.insert(file_name.to_string(), path);
        }
    }

    if parts.is_empty() {
        return Err(ApiError::bad_request("No files uploaded"));
    }
    for part in &mut parts {
        part.path = paths.get(&part.file_name).cloned();
    }

    let id = CodebaseId::new();
    let repo = CodebaseRepository::new(state.db.pool());
    repo.create_pending(&id).await?;

    let outcome = state
        .storage
        .store(&id, parts)
        .await
        .map_err(storage_error)?;

    let stored = match outcome {
        StoreOutcome::Stored(stored) => stored,
        StoreOutcome::Rejected { status, message } => {
            tracing::warn!(codebase_id = %id, %status, %message, "Storage tier rejected upload");
            if let Err(e) = repo.delete(&id).await {
                tracing::warn!(codebase_id = %id, error = %e, "Failed to delete pending codebase");
            }
            return Err(ApiError::new(ErrorCode::from_status(status), message));
        }
    };

    repo.commit(&id, &stored.files).await?;

    let total_bytes = stored.total_bytes();
    tracing::info!(
        codebase_id = %id,
        files = stored.files.len(),
        rejected = stored.rejected.len(),
        total_bytes,
        "Codebase uploaded"
    );

    Ok(Json(UploadResponse {
        success: true,
        message: format!(
            "Successfully uploaded {} files ({} bytes total)",
            stored.files.len(),
            total_bytes
        ),
        directory_id: id,
        uploaded_files: stored.files.into_iter().map(|f| f.path).collect(),
    }))
}

/// GET /codebases - List committed codebases, newest first.
pub async fn list_codebases(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<CodebaseListResponse>, ApiError> {
    let repo = CodebaseRepository::new(state.db.pool());
    let codebases = repo
        .list()
        .await?
        .iter()
        .map(|c| c.summary())
        .collect::<crate::Result<Vec<_>>>()?;

    Ok(Json(CodebaseListResponse {
        success: true,
        codebases,
    }))
}

/// GET /codebases/:id - File tree of one codebase.
///
/// Requires a committed ledger row and a storage tier listing.
pub async fn get_codebase(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<FileListResponse>, ApiError> {
    let id = CodebaseId::parse(&id)?;

    let repo = CodebaseRepository::new(state.db.pool());
    match repo.get(&id).await? {
        Some(codebase) if codebase.is_committed() => {}
        _ => return Err(ApiError::codebase_not_found()),
    }

    let files = state
        .storage
        .list_files(&id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| {
            tracing::warn!(codebase_id = %id, "Ledger row has no stored files");
            ApiError::codebase_not_found()
        })?;

    Ok(Json(FileListResponse {
        success: true,
        directory_id: id,
        files,
    }))
}

/// GET /codebases/:id/content?file= - Read one file.
pub async fn get_file_content(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Response, ApiError> {
    let id = CodebaseId::parse(&id)?;
    let path = query.relative_path()?;

    let upstream = state
        .storage
        .content(&id, &path)
        .await
        .map_err(storage_error)?;
    if !upstream.status().is_success() {
        return Ok(relay(upstream));
    }

    let mut content: ContentResponse = upstream.json().await.map_err(|e| storage_error(e.into()))?;
    if content.download_url.is_some() {
        let file_path = sanitize(&content.file_path).unwrap_or(path);
        content.download_url = Some(api_download_url(&id, &file_path));
    }

    Ok(Json(content).into_response())
}

/// GET /codebases/:id/download?file= - Download one file.
pub async fn download_file(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Response, ApiError> {
    let id = CodebaseId::parse(&id)?;
    let path = query.relative_path()?;

    let upstream = state
        .storage
        .download(&id, &path)
        .await
        .map_err(storage_error)?;

    Ok(relay(upstream))
}

/// GET /codebases/:id/zip - Download the whole codebase as a ZIP archive.
pub async fn download_zip(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = CodebaseId::parse(&id)?;

    let upstream = state.storage.zip(&id).await.map_err(storage_error)?;

    Ok(relay(upstream))
}
