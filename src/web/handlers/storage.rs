//! Storage tier handlers.
//!
//! These endpoints own the blob store: they accept uploads, serve file
//! content, raw downloads and ZIP archives, and list what is on disk.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};

use super::{storage_download_url, StorageState};
use crate::vault::{is_text, stream_archive, CodebaseId, Ingestion};
use crate::web::dto::{
    CodebaseListResponse, ContentResponse, FileListResponse, FileQuery, MessageResponse,
    StoreResponse, BINARY_CONTENT_NOTICE, CODEBASE_ID_FIELD, FILES_FIELD, PATH_FIELD_PREFIX,
};
use crate::web::error::ApiError;

/// Build a Content-Disposition header value with proper escaping.
///
/// ASCII names are quoted as-is. Anything else gets a sanitized ASCII
/// `filename` plus an RFC 5987 `filename*` with the UTF-8 name.
pub(crate) fn content_disposition_header(filename: &str) -> String {
    let needs_escape = |c: char| !c.is_ascii() || c.is_ascii_control() || c == '"' || c == '\\';

    if !filename.chars().any(needs_escape) {
        return format!("attachment; filename=\"{filename}\"");
    }

    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if needs_escape(c) { '_' } else { c })
        .collect();
    let encoded = urlencoding::encode(filename);

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

fn form_error(e: impl std::fmt::Display) -> ApiError {
    tracing::warn!(error = %e, "Failed to read multipart upload");
    ApiError::bad_request("File too large or invalid form data")
}

/// POST /store - Store a multipart batch of files.
///
/// `codebase_id` must come before any file part, and each `path_<name>`
/// override before the file part it applies to. File parts are streamed
/// straight to disk.
pub async fn store_files(
    State(state): State<Arc<StorageState>>,
    mut multipart: Multipart,
) -> Result<Json<StoreResponse>, ApiError> {
    let mut ingestion: Option<Ingestion<'_>> = None;
    let mut paths: HashMap<String, String> = HashMap::new();
    let mut file_parts = 0usize;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                if let Some(ingestion) = ingestion.take() {
                    ingestion.abort().await;
                }
                return Err(form_error(e));
            }
        };
        let name = field.name().unwrap_or_default().to_string();

        if name == CODEBASE_ID_FIELD {
            if let Some(ingestion) = ingestion.take() {
                ingestion.abort().await;
                return Err(ApiError::bad_request("Duplicate codebase ID"));
            }
            let text = field.text().await.map_err(form_error)?;
            let id = CodebaseId::parse(text.trim())?;
            ingestion = Some(Ingestion::begin(&state.store, id).await?);
        } else if let Some(file_name) = name.strip_prefix(PATH_FIELD_PREFIX) {
            match field.text().await {
                Ok(path) => {
                    paths.insert(file_name.to_string(), path);
                }
                Err(e) => {
                    if let Some(ingestion) = ingestion.take() {
                        ingestion.abort().await;
                    }
                    return Err(form_error(e));
                }
            }
        } else if name == FILES_FIELD {
            let Some(current) = ingestion.as_mut() else {
                return Err(ApiError::bad_request("Codebase ID is required"));
            };
            file_parts += 1;

            let declared_name = field.file_name().unwrap_or_default().to_string();
            let declared_path = paths.remove(&declared_name);
            let reader = StreamReader::new(field.map_err(io::Error::other));
            tokio::pin!(reader);
            current
                .add(&declared_name, declared_path.as_deref(), &mut reader)
                .await;
        }
    }

    let Some(ingestion) = ingestion else {
        return Err(ApiError::bad_request("Codebase ID is required"));
    };
    if file_parts == 0 {
        ingestion.abort().await;
        return Err(ApiError::bad_request("No files uploaded"));
    }

    let report = ingestion.finish().await?;
    Ok(Json(StoreResponse {
        success: true,
        message: format!(
            "Successfully stored {} files ({} bytes total)",
            report.accepted.len(),
            report.total_bytes
        ),
        codebase_id: report.codebase_id,
        files: report.accepted,
        rejected: report.rejected,
    }))
}

/// GET /content/:id?file= - Read one file, classified as text or binary.
pub async fn get_content(
    State(state): State<Arc<StorageState>>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Json<ContentResponse>, ApiError> {
    let id = CodebaseId::parse(&id)?;
    let path = query.relative_path()?;

    let blob = state.store.get(&id, &path).await?;
    let text = is_text(&blob.content);

    let (content, download_url) = if text {
        let content = String::from_utf8(blob.content)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
        (content, None)
    } else {
        (
            BINARY_CONTENT_NOTICE.to_string(),
            Some(storage_download_url(&id, &path)),
        )
    };

    Ok(Json(ContentResponse {
        success: true,
        file_path: path.to_string(),
        size: blob.size,
        is_text: text,
        modified: blob.modified,
        content,
        download_url,
    }))
}

/// GET /download/:id?file= - Stream one file's raw bytes.
pub async fn download_file(
    State(state): State<Arc<StorageState>>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Response, ApiError> {
    let id = CodebaseId::parse(&id)?;
    let path = query.relative_path()?;

    let stored = state.store.open(&id, &path).await?;
    tracing::info!(codebase_id = %id, path = %path, size = stored.size, "Serving file download");

    Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(path.file_name()),
        )
        .header(header::CONTENT_LENGTH, stored.size)
        .body(Body::from_stream(ReaderStream::new(stored.file)))
        .map_err(|e| {
            tracing::error!("Failed to build download response: {}", e);
            ApiError::internal("An internal error occurred")
        })
}

/// GET /zip/:id - Stream the whole codebase as a ZIP archive.
pub async fn download_zip(
    State(state): State<Arc<StorageState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = CodebaseId::parse(&id)?;
    let root = state.store.require_codebase(&id).await?;
    tracing::info!(codebase_id = %id, "Serving ZIP archive");

    Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&format!("codebase-{id}.zip")),
        )
        .body(Body::from_stream(stream_archive(root)))
        .map_err(|e| {
            tracing::error!("Failed to build archive response: {}", e);
            ApiError::internal("An internal error occurred")
        })
}

/// GET /files/:id - Authoritative file listing of one codebase.
pub async fn list_files(
    State(state): State<Arc<StorageState>>,
    Path(id): Path<String>,
) -> Result<Json<FileListResponse>, ApiError> {
    let id = CodebaseId::parse(&id)?;
    let files = state.store.list(&id).await?;

    Ok(Json(FileListResponse {
        success: true,
        directory_id: id,
        files,
    }))
}

/// GET /codebases - Codebases present on disk.
pub async fn list_stored_codebases(
    State(state): State<Arc<StorageState>>,
) -> Result<Json<CodebaseListResponse>, ApiError> {
    let codebases = state.store.list_codebases().await?;

    Ok(Json(CodebaseListResponse {
        success: true,
        codebases,
    }))
}

/// DELETE /store/:id - Remove a codebase and all of its files.
pub async fn delete_codebase(
    State(state): State<Arc<StorageState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = CodebaseId::parse(&id)?;

    if !state.store.remove(&id).await? {
        return Err(ApiError::codebase_not_found());
    }
    tracing::info!(codebase_id = %id, "Removed codebase");

    Ok(Json(MessageResponse::new("Codebase deleted")))
}
