//! Codebase ledger repository.
//!
//! A codebase row is written as `pending` before any blob is stored and
//! promoted to `committed` together with its file rows in one transaction.
//! Listings only ever see committed rows.

use chrono::{DateTime, Utc};

use super::{now_text, DbPool};
use crate::vault::{CodebaseId, CodebaseSummary, FileEntry};
use crate::{Result, VaultError};

/// Ledger state of a codebase row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodebaseStatus {
    /// Row written, blobs not yet confirmed.
    Pending,
    /// Blobs stored and file rows recorded.
    Committed,
}

impl CodebaseStatus {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CodebaseStatus::Pending => "pending",
            CodebaseStatus::Committed => "committed",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CodebaseStatus::Pending),
            "committed" => Some(CodebaseStatus::Committed),
            _ => None,
        }
    }
}

/// Codebase entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Codebase {
    /// Canonical codebase id.
    pub id: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Number of recorded files.
    pub file_count: i64,
    /// `pending` or `committed`.
    pub status: String,
}

impl Codebase {
    /// Get the status as enum.
    pub fn status(&self) -> Option<CodebaseStatus> {
        CodebaseStatus::parse(&self.status)
    }

    pub fn is_committed(&self) -> bool {
        self.status() == Some(CodebaseStatus::Committed)
    }

    /// Parsed creation time.
    pub fn created_at(&self) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| VaultError::Database(format!("bad created_at '{}': {e}", self.created_at)))
    }

    /// Convert to a listing summary.
    pub fn summary(&self) -> Result<CodebaseSummary> {
        Ok(CodebaseSummary {
            directory_id: CodebaseId::parse(&self.id)?,
            created_at: self.created_at()?,
            file_count: self.file_count,
        })
    }
}

/// File entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileRecord {
    pub id: i64,
    pub codebase_id: String,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub created_at: String,
}

/// Repository for codebase ledger operations.
pub struct CodebaseRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> CodebaseRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Record a new codebase in the `pending` state.
    pub async fn create_pending(&self, id: &CodebaseId) -> Result<Codebase> {
        let created_at = now_text();

        sqlx::query("INSERT INTO codebases (id, created_at, file_count, status) VALUES ($1, $2, 0, $3)")
            .bind(id.to_string())
            .bind(&created_at)
            .bind(CodebaseStatus::Pending.as_str())
            .execute(self.pool)
            .await?;

        Ok(Codebase {
            id: id.to_string(),
            created_at,
            file_count: 0,
            status: CodebaseStatus::Pending.as_str().to_string(),
        })
    }

    /// Record the stored files and promote the codebase to `committed`.
    ///
    /// Runs in a single transaction; fails with `NotFound` if there is no
    /// pending row for `id`.
    pub async fn commit(&self, id: &CodebaseId, files: &[FileEntry]) -> Result<()> {
        let id_text = id.to_string();
        let created_at = now_text();
        let mut tx = self.pool.begin().await?;

        for file in files {
            sqlx::query(
                "INSERT INTO files (codebase_id, file_path, file_name, file_size, created_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&id_text)
            .bind(&file.path)
            .bind(&file.name)
            .bind(file.size as i64)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;
        }

        let result = sqlx::query(
            "UPDATE codebases SET status = $1, file_count = $2 WHERE id = $3 AND status = $4",
        )
        .bind(CodebaseStatus::Committed.as_str())
        .bind(files.len() as i64)
        .bind(&id_text)
        .bind(CodebaseStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(VaultError::NotFound("Codebase".to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete a codebase row and its file rows.
    ///
    /// Returns `true` if a row was deleted.
    pub async fn delete(&self, id: &CodebaseId) -> Result<bool> {
        let id_text = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM files WHERE codebase_id = $1")
            .bind(&id_text)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM codebases WHERE id = $1")
            .bind(&id_text)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get a codebase row by id, in any state.
    pub async fn get(&self, id: &CodebaseId) -> Result<Option<Codebase>> {
        let codebase = sqlx::query_as::<_, Codebase>(
            "SELECT id, created_at, file_count, status FROM codebases WHERE id = $1",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?;

        Ok(codebase)
    }

    /// List committed codebases, newest first.
    pub async fn list(&self) -> Result<Vec<Codebase>> {
        let codebases = sqlx::query_as::<_, Codebase>(
            "SELECT id, created_at, file_count, status FROM codebases
             WHERE status = $1 ORDER BY created_at DESC",
        )
        .bind(CodebaseStatus::Committed.as_str())
        .fetch_all(self.pool)
        .await?;

        Ok(codebases)
    }

    /// List the recorded files of a codebase in insertion order.
    pub async fn list_files(&self, id: &CodebaseId) -> Result<Vec<FileRecord>> {
        let files = sqlx::query_as::<_, FileRecord>(
            "SELECT id, codebase_id, file_path, file_name, file_size, created_at
             FROM files WHERE codebase_id = $1 ORDER BY id",
        )
        .bind(id.to_string())
        .fetch_all(self.pool)
        .await?;

        Ok(files)
    }

    /// Pending rows created before `cutoff`.
    pub async fn list_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Codebase>> {
        let cutoff = cutoff.to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        let codebases = sqlx::query_as::<_, Codebase>(
            "SELECT id, created_at, file_count, status FROM codebases
             WHERE status = $1 AND created_at < $2 ORDER BY created_at",
        )
        .bind(CodebaseStatus::Pending.as_str())
        .bind(cutoff)
        .fetch_all(self.pool)
        .await?;

        Ok(codebases)
    }
}
