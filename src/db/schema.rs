//! Database schema and migrations for codevault.
//!
//! Migrations are applied sequentially when the database is opened. The
//! schema_version table tracks which migrations have been applied.
//! Timestamps are RFC 3339 UTC text written by the application.

/// Database migrations (SQLite).
#[cfg(feature = "sqlite")]
pub const MIGRATIONS: &[&str] = &[
    // v1: Codebases and their files
    r#"
-- One row per uploaded codebase; only 'committed' rows are visible
CREATE TABLE codebases (
    id          TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL,
    file_count  INTEGER NOT NULL DEFAULT 0,
    status      TEXT NOT NULL DEFAULT 'pending'   -- 'pending', 'committed'
);

CREATE INDEX idx_codebases_status_created ON codebases(status, created_at);

CREATE TABLE files (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    codebase_id  TEXT NOT NULL REFERENCES codebases(id) ON DELETE CASCADE,
    file_path    TEXT NOT NULL,
    file_name    TEXT NOT NULL,
    file_size    INTEGER NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE INDEX idx_files_codebase_id ON files(codebase_id);
"#,
];

/// Database migrations (PostgreSQL).
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub const MIGRATIONS: &[&str] = &[
    // v1: Codebases and their files
    r#"
CREATE TABLE codebases (
    id          TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL,
    file_count  BIGINT NOT NULL DEFAULT 0,
    status      TEXT NOT NULL DEFAULT 'pending'
);

CREATE INDEX idx_codebases_status_created ON codebases(status, created_at);

CREATE TABLE files (
    id           BIGSERIAL PRIMARY KEY,
    codebase_id  TEXT NOT NULL REFERENCES codebases(id) ON DELETE CASCADE,
    file_path    TEXT NOT NULL,
    file_name    TEXT NOT NULL,
    file_size    BIGINT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE INDEX idx_files_codebase_id ON files(codebase_id);
"#,
];
