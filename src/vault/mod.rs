//! Codebase storage core for codevault.
//!
//! This module holds everything both tiers share:
//! - Codebase identifiers and file entries
//! - Path sanitization against a codebase root
//! - Text/binary content classification
//! - On-disk blob storage and directory listings
//! - Streaming ZIP archive construction
//! - Batch upload ingestion

mod archive;
mod classify;
mod ingest;
mod path;
mod storage;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::VaultError;

pub use archive::{stream_archive, write_archive};
pub use classify::{is_text, INSPECT_LIMIT};
pub use ingest::{ingest, IngestReport, Ingestion, Rejection, RejectionReason};
pub use path::{base_name, sanitize, PathRejection, RelativePath};
pub use storage::{BlobContent, BlobStore, StoredFile};

/// Unique identifier of an uploaded codebase.
///
/// Only the canonical 36-character hyphenated UUID form is accepted, so the
/// textual id is always safe to use as a directory name or query key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodebaseId(Uuid);

impl CodebaseId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a canonical hyphenated UUID (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, VaultError> {
        if s.len() != 36 {
            return Err(VaultError::InvalidCodebaseId(s.to_string()));
        }
        Uuid::try_parse(s)
            .map(Self)
            .map_err(|_| VaultError::InvalidCodebaseId(s.to_string()))
    }
}

impl Default for CodebaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CodebaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for CodebaseId {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CodebaseId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CodebaseId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// One stored file of a codebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Final path segment.
    pub name: String,
    /// Number of bytes on disk.
    pub size: u64,
    /// Forward-slash relative path inside the codebase.
    pub path: String,
}

/// Summary of one codebase for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodebaseSummary {
    pub directory_id: CodebaseId,
    pub created_at: DateTime<Utc>,
    pub file_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codebase_id_roundtrip_display() {
        let id = CodebaseId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(CodebaseId::parse(&text).unwrap(), id);
    }

    #[test]
    fn test_codebase_id_case_insensitive() {
        let upper = "6F9619FF-8B86-D011-B42D-00C04FC964FF";
        let id = CodebaseId::parse(upper).unwrap();
        assert_eq!(id.to_string(), upper.to_lowercase());
    }

    #[test]
    fn test_codebase_id_rejects_other_forms() {
        for bad in [
            "",
            "not-a-uuid",
            "6f9619ff8b86d011b42d00c04fc964ff",
            "{6f9619ff-8b86-d011-b42d-00c04fc964ff}",
            "urn:uuid:6f9619ff-8b86-d011-b42d-00c04fc964ff",
            "../6f9619ff-8b86-d011-b42d-00c04fc964f",
            "6f9619ff-8b86-d011-b42d-00c04fc964fg",
        ] {
            assert!(
                matches!(CodebaseId::parse(bad), Err(VaultError::InvalidCodebaseId(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_codebase_id_serde() {
        let id = CodebaseId::parse("6f9619ff-8b86-d011-b42d-00c04fc964ff").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"6f9619ff-8b86-d011-b42d-00c04fc964ff\"");

        let back: CodebaseId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<CodebaseId>("\"nope\"").is_err());
    }

    #[test]
    fn test_file_entry_json_shape() {
        let entry = FileEntry {
            name: "b.txt".to_string(),
            size: 3,
            path: "sub/b.txt".to_string(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["name"], "b.txt");
        assert_eq!(value["size"], 3);
        assert_eq!(value["path"], "sub/b.txt");
    }
}
