//! Request DTOs for both HTTP tiers.

use serde::Deserialize;

use crate::vault::{sanitize, RelativePath};
use crate::web::error::ApiError;

/// Multipart field carrying file parts.
pub const FILES_FIELD: &str = "files";
/// Multipart field carrying the target codebase id (storage tier).
pub const CODEBASE_ID_FIELD: &str = "codebase_id";
/// Prefix of the per-file relative path override fields.
pub const PATH_FIELD_PREFIX: &str = "path_";

/// Name of the path override field for an uploaded file name.
pub fn path_field_name(file_name: &str) -> String {
    format!("{PATH_FIELD_PREFIX}{file_name}")
}

/// `?file=` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    /// Relative path of the requested file.
    #[serde(default)]
    pub file: Option<String>,
}

impl FileQuery {
    /// Sanitized requested path.
    pub fn relative_path(&self) -> Result<RelativePath, ApiError> {
        let raw = self
            .file
            .as_deref()
            .filter(|f| !f.is_empty())
            .ok_or_else(ApiError::path_required)?;
        sanitize(raw).map_err(|_| ApiError::invalid_path())
    }
}
