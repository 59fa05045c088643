//! HTTP client the API tier uses to reach the storage tier.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::StatusCode;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use url::Url;

use super::dto::{path_field_name, StoreResponse, CODEBASE_ID_FIELD, FILES_FIELD};
use crate::vault::{CodebaseId, FileEntry, RelativePath};
use crate::{Result, VaultError};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// User agent string for storage tier requests.
const USER_AGENT: &str = concat!("codevault/", env!("CARGO_PKG_VERSION"));

/// One file to forward to the storage tier.
#[derive(Debug, Clone)]
pub struct UploadPart {
    /// Client-declared file name.
    pub file_name: String,
    /// Client-declared relative path, if any.
    pub path: Option<String>,
    pub content: Bytes,
}

/// Result of forwarding an upload batch.
#[derive(Debug)]
pub enum StoreOutcome {
    /// The storage tier stored at least one file.
    Stored(StoreResponse),
    /// The storage tier refused the batch with a client error.
    Rejected { status: StatusCode, message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: String,
}

#[derive(Debug, Deserialize)]
struct FilesEnvelope {
    files: Vec<FileEntry>,
}

/// Storage tier client.
#[derive(Debug, Clone)]
pub struct StorageClient {
    client: Client,
    base: Url,
}

impl StorageClient {
    /// Create a client for the storage tier at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| VaultError::Config(format!("invalid storage URL '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(VaultError::Config(format!(
                "invalid storage URL '{base_url}': not a base URL"
            )));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| VaultError::Storage(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base })
    }

    /// Build `{base}/{segments...}` with an optional `file` query parameter.
    fn url(&self, segments: &[&str], file: Option<&RelativePath>) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| VaultError::Config("storage URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        if let Some(file) = file {
            url.query_pairs_mut().append_pair("file", file.as_str());
        }
        Ok(url)
    }

    /// Forward an upload batch to `POST /store`.
    ///
    /// Each path override is sent immediately before its file part. Names
    /// keep their spelling except for the characters a multipart header
    /// cannot carry, which are escaped the way browsers escape them.
    pub async fn store(&self, id: &CodebaseId, parts: Vec<UploadPart>) -> Result<StoreOutcome> {
        let mut form = Form::new()
            .percent_encode_noop()
            .text(CODEBASE_ID_FIELD, id.to_string());
        for part in parts {
            let file_name = header_safe_name(&part.file_name);
            if let Some(path) = part.path {
                form = form.text(path_field_name(&file_name), path);
            }
            let len = part.content.len() as u64;
            let file = Part::stream_with_length(reqwest::Body::from(part.content), len)
                .file_name(file_name);
            form = form.part(FILES_FIELD, file);
        }

        let response = self
            .client
            .post(self.url(&["store"], None)?)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let stored: StoreResponse = response.json().await?;
            return Ok(StoreOutcome::Stored(stored));
        }
        let message = error_message(response).await;
        if status.is_client_error() {
            return Ok(StoreOutcome::Rejected { status, message });
        }
        Err(VaultError::Storage(format!("POST /store returned {status}: {message}")))
    }

    /// Authoritative file listing; `None` if the storage tier has no such codebase.
    pub async fn list_files(&self, id: &CodebaseId) -> Result<Option<Vec<FileEntry>>> {
        let id_text = id.to_string();
        let response = self
            .client
            .get(self.url(&["files", &id_text], None)?)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let envelope: FilesEnvelope = response.json().await?;
                Ok(Some(envelope.files))
            }
            s => {
                let message = error_message(response).await;
                Err(VaultError::Storage(format!("GET /files returned {s}: {message}")))
            }
        }
    }

    /// Remove a codebase's blobs; `false` if there was nothing to remove.
    pub async fn delete(&self, id: &CodebaseId) -> Result<bool> {
        let id_text = id.to_string();
        let response = self
            .client
            .delete(self.url(&["store", &id_text], None)?)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => {
                let message = error_message(response).await;
                Err(VaultError::Storage(format!("DELETE /store returned {s}: {message}")))
            }
        }
    }

    /// `GET /content/{id}?file=`.
    pub async fn content(&self, id: &CodebaseId, file: &RelativePath) -> Result<Response> {
        self.fetch(&["content", &id.to_string()], Some(file)).await
    }

    /// `GET /download/{id}?file=`.
    pub async fn download(&self, id: &CodebaseId, file: &RelativePath) -> Result<Response> {
        self.fetch(&["download", &id.to_string()], Some(file)).await
    }

    /// `GET /zip/{id}`.
    pub async fn zip(&self, id: &CodebaseId) -> Result<Response> {
        self.fetch(&["zip", &id.to_string()], None).await
    }

    /// Liveness of the storage tier.
    pub async fn health(&self) -> Result<bool> {
        let response = self.fetch(&["health"], None).await?;
        Ok(response.status().is_success())
    }

    async fn fetch(&self, segments: &[&str], file: Option<&RelativePath>) -> Result<Response> {
        let url = self.url(segments, file)?;
        Ok(self.client.get(url).send().await?)
    }
}

/// Escape `"`, CR and LF in a form field or file name.
///
/// An unescaped quote would end the `name="..."` parameter early and
/// unpair a path override from its file.
fn header_safe_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Error message of a storage tier error response, or its status text.
async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => envelope.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("storage tier error")
            .to_string(),
    }
}
