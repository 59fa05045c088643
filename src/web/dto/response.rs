//! Response DTOs for both HTTP tiers.
//!
//! The API tier deserializes the storage tier's responses, so most types
//! derive both directions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vault::{CodebaseId, CodebaseSummary, FileEntry, Rejection};

/// Placeholder content returned for binary files.
pub const BINARY_CONTENT_NOTICE: &str = "Binary file - use download endpoint to get the file";

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Plain success message.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// POST /upload response.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub directory_id: CodebaseId,
    /// Relative paths of the stored files.
    pub uploaded_files: Vec<String>,
}

/// POST /store response (storage tier).
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreResponse {
    pub success: bool,
    pub message: String,
    pub codebase_id: CodebaseId,
    /// Files actually written, with their on-disk sizes.
    pub files: Vec<FileEntry>,
    /// Entries that were skipped.
    #[serde(default)]
    pub rejected: Vec<Rejection>,
}

impl StoreResponse {
    /// Sum of all stored file sizes.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Codebase listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct CodebaseListResponse {
    pub success: bool,
    pub codebases: Vec<CodebaseSummary>,
}

/// File tree of one codebase.
#[derive(Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    pub success: bool,
    pub directory_id: CodebaseId,
    pub files: Vec<FileEntry>,
}

/// Content of one file, classified as text or binary.
#[derive(Debug, Serialize, Deserialize)]
pub struct ContentResponse {
    pub success: bool,
    pub file_path: String,
    pub size: u64,
    pub is_text: bool,
    pub modified: DateTime<Utc>,
    /// File text, or a notice for binary files.
    pub content: String,
    /// Where to fetch the raw bytes of a binary file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}
