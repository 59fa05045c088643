//! Batch upload ingestion.
//!
//! An [`Ingestion`] creates a fresh codebase directory, accepts entries one
//! at a time and either finishes with a report of what was stored or
//! removes the directory again.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use super::path::{base_name, sanitize, PathRejection, RelativePath};
use super::storage::BlobStore;
use super::{CodebaseId, FileEntry};
use crate::{Result, VaultError};

/// Why an uploaded entry was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Declared file name is empty, `.` or `..`.
    InvalidName,
    /// Declared relative path failed sanitization.
    InvalidPath,
    /// Another entry in the batch already claimed the path.
    Duplicate,
    /// Writing the blob failed.
    Storage,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionReason::InvalidName => "invalid file name",
            RejectionReason::InvalidPath => "invalid file path",
            RejectionReason::Duplicate => "duplicate file path",
            RejectionReason::Storage => "storage failure",
        };
        f.write_str(s)
    }
}

/// A skipped entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub name: String,
    pub reason: RejectionReason,
}

/// Outcome of a successful batch.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub codebase_id: CodebaseId,
    pub accepted: Vec<FileEntry>,
    pub rejected: Vec<Rejection>,
    pub total_bytes: u64,
}

/// An upload batch in progress.
#[derive(Debug)]
pub struct Ingestion<'a> {
    store: &'a BlobStore,
    codebase_id: CodebaseId,
    accepted: Vec<FileEntry>,
    rejected: Vec<Rejection>,
    seen: HashSet<RelativePath>,
}

impl<'a> Ingestion<'a> {
    /// Create the codebase directory and start a batch.
    pub async fn begin(store: &'a BlobStore, codebase_id: CodebaseId) -> Result<Self> {
        store.create_codebase(&codebase_id).await?;

        Ok(Self {
            store,
            codebase_id,
            accepted: Vec::new(),
            rejected: Vec::new(),
            seen: HashSet::new(),
        })
    }

    /// Store one entry.
    ///
    /// `declared_path` falls back to the base name of `declared_name` when
    /// absent or empty. Returns whether the entry was stored; rejected
    /// entries are recorded and do not fail the batch.
    pub async fn add<R>(
        &mut self,
        declared_name: &str,
        declared_path: Option<&str>,
        reader: &mut R,
    ) -> bool
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let Some(name) = base_name(declared_name) else {
            self.reject(declared_name, RejectionReason::InvalidName, None);
            return false;
        };

        let raw_path = declared_path.filter(|p| !p.is_empty()).unwrap_or(name);
        let path = match sanitize(raw_path) {
            Ok(path) => path,
            Err(e) => {
                self.reject(declared_name, RejectionReason::InvalidPath, Some(&e));
                return false;
            }
        };

        if self.seen.contains(&path) {
            self.reject(declared_name, RejectionReason::Duplicate, None);
            return false;
        }

        match self.store.put(&self.codebase_id, &path, reader).await {
            Ok(size) => {
                tracing::debug!(codebase_id = %self.codebase_id, path = %path, size, "Stored file");
                self.accepted.push(FileEntry {
                    name: path.file_name().to_string(),
                    size,
                    path: path.to_string(),
                });
                self.seen.insert(path);
                true
            }
            Err(VaultError::Conflict(_)) => {
                self.reject(declared_name, RejectionReason::Duplicate, None);
                false
            }
            Err(VaultError::InvalidPath(msg)) => {
                tracing::warn!(codebase_id = %self.codebase_id, name = declared_name, %msg, "Rejected upload entry");
                self.rejected.push(Rejection {
                    name: declared_name.to_string(),
                    reason: RejectionReason::InvalidPath,
                });
                false
            }
            Err(e) => {
                tracing::warn!(codebase_id = %self.codebase_id, name = declared_name, error = %e, "Failed to store upload entry");
                self.rejected.push(Rejection {
                    name: declared_name.to_string(),
                    reason: RejectionReason::Storage,
                });
                false
            }
        }
    }

    /// Close the batch.
    ///
    /// With no accepted entries the codebase directory is removed and
    /// [`VaultError::NoValidFiles`] is returned.
    pub async fn finish(self) -> Result<IngestReport> {
        if self.accepted.is_empty() {
            tracing::warn!(
                codebase_id = %self.codebase_id,
                rejected = self.rejected.len(),
                "No valid files in upload batch"
            );
            self.remove_codebase().await;
            return Err(VaultError::NoValidFiles);
        }

        let total_bytes: u64 = self.accepted.iter().map(|f| f.size).sum();
        tracing::info!(
            codebase_id = %self.codebase_id,
            files = self.accepted.len(),
            rejected = self.rejected.len(),
            total_bytes,
            "Stored codebase"
        );

        Ok(IngestReport {
            codebase_id: self.codebase_id,
            accepted: self.accepted,
            rejected: self.rejected,
            total_bytes,
        })
    }

    /// Abandon the batch and remove everything stored so far.
    pub async fn abort(self) {
        tracing::warn!(codebase_id = %self.codebase_id, "Aborting upload batch");
        self.remove_codebase().await;
    }

    fn reject(&mut self, name: &str, reason: RejectionReason, cause: Option<&PathRejection>) {
        match cause {
            Some(cause) => {
                tracing::warn!(codebase_id = %self.codebase_id, name, %reason, %cause, "Rejected upload entry")
            }
            None => tracing::warn!(codebase_id = %self.codebase_id, name, %reason, "Rejected upload entry"),
        }
        self.rejected.push(Rejection {
            name: name.to_string(),
            reason,
        });
    }

    async fn remove_codebase(&self) {
        if let Err(e) = self.store.remove(&self.codebase_id).await {
            tracing::error!(codebase_id = %self.codebase_id, error = %e, "Failed to remove codebase");
        }
    }
}

/// Ingest a whole batch of `(declared name, declared path, content)` entries.
pub async fn ingest<I, R>(store: &BlobStore, codebase_id: CodebaseId, entries: I) -> Result<IngestReport>
where
    I: IntoIterator<Item = (String, Option<String>, R)>,
    R: AsyncRead + Unpin,
{
    let mut ingestion = Ingestion::begin(store, codebase_id).await?;
    for (name, path, mut reader) in entries {
        ingestion.add(&name, path.as_deref(), &mut reader).await;
    }
    ingestion.finish().await
}
