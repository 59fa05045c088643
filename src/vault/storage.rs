//! Blob storage for codevault.
//!
//! This module owns the on-disk layout of uploaded codebases:
//! - One directory per codebase, named by its canonical id
//! - Files stored at their sanitized relative path inside it
//! - Directory listings and codebase summaries
//!
//! ```text
//! {base_path}/
//! ├── 6f9619ff-8b86-d011-b42d-00c04fc964ff/
//! │   ├── README.md
//! │   └── src/
//! │       └── main.rs
//! └── ...
//! ```

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use walkdir::WalkDir;

use super::path::{is_strict_descendant, RelativePath};
use super::{CodebaseId, CodebaseSummary, FileEntry};
use crate::{Result, VaultError};

/// An opened stored file, ready to stream.
#[derive(Debug)]
pub struct StoredFile {
    pub file: fs::File,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Full content of a stored file.
#[derive(Debug, Clone)]
pub struct BlobContent {
    pub content: Vec<u8>,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Blob store rooted at a base directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    /// Base directory holding one directory per codebase.
    base_path: PathBuf,
}

impl BlobStore {
    /// Create a new BlobStore with the given base path.
    ///
    /// The base directory will be created if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the base path of this store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Root directory of a codebase (may not exist).
    pub fn codebase_root(&self, id: &CodebaseId) -> PathBuf {
        self.base_path.join(id.to_string())
    }

    /// Create the root directory for a new codebase.
    pub async fn create_codebase(&self, id: &CodebaseId) -> Result<()> {
        match fs::create_dir(self.codebase_root(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(VaultError::Conflict(format!("Codebase {id}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the codebase root directory exists.
    pub async fn exists(&self, id: &CodebaseId) -> bool {
        fs::metadata(self.codebase_root(id))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Root directory of an existing codebase.
    pub async fn require_codebase(&self, id: &CodebaseId) -> Result<PathBuf> {
        let root = self.codebase_root(id);
        match fs::metadata(&root).await {
            Ok(m) if m.is_dir() => Ok(root),
            Ok(_) => Err(VaultError::NotFound("Codebase".to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(VaultError::NotFound("Codebase".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write `reader` to a new file and return the number of bytes written.
    ///
    /// Parent directories are created as needed. An existing file is never
    /// overwritten; a failed write removes the partial file and any
    /// directories this call created for it.
    pub async fn put<R>(&self, id: &CodebaseId, path: &RelativePath, reader: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let root = self.require_codebase(id).await?;
        let full = path
            .resolve(&root)
            .map_err(|e| VaultError::InvalidPath(e.to_string()))?;

        let created = match full.parent() {
            Some(parent) => {
                let missing = missing_dirs(&root, parent).await;
                if let Err(e) = fs::create_dir_all(parent).await {
                    prune_empty_dirs(&missing).await;
                    return Err(e.into());
                }
                missing
            }
            None => Vec::new(),
        };

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(VaultError::Conflict(path.to_string()));
            }
            Err(e) => {
                prune_empty_dirs(&created).await;
                return Err(e.into());
            }
        };

        let written = async {
            let n = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            Ok::<_, io::Error>(n)
        }
        .await;

        match written {
            Ok(n) => Ok(n),
            Err(e) => {
                drop(file);
                if let Err(rm) = fs::remove_file(&full).await {
                    tracing::warn!(path = %full.display(), error = %rm, "Failed to remove partial file");
                }
                prune_empty_dirs(&created).await;
                Err(e.into())
            }
        }
    }

    /// Read the full content of a stored file.
    pub async fn get(&self, id: &CodebaseId, path: &RelativePath) -> Result<BlobContent> {
        let full = self.resolve_file(id, path).await?;
        let meta = fs::metadata(&full).await?;
        let content = fs::read(&full).await?;

        Ok(BlobContent {
            size: content.len() as u64,
            content,
            modified: modified_time(&meta),
        })
    }

    /// Open a stored file for streaming.
    pub async fn open(&self, id: &CodebaseId, path: &RelativePath) -> Result<StoredFile> {
        let full = self.resolve_file(id, path).await?;
        let file = fs::File::open(&full).await?;
        let meta = file.metadata().await?;

        Ok(StoredFile {
            file,
            size: meta.len(),
            modified: modified_time(&meta),
        })
    }

    /// List every regular file of a codebase, sorted by traversal order.
    pub async fn list(&self, id: &CodebaseId) -> Result<Vec<FileEntry>> {
        let root = self.require_codebase(id).await?;
        blocking(move || list_files(&root)).await
    }

    /// Remove a codebase and everything under it.
    ///
    /// Returns `false` if the codebase did not exist.
    pub async fn remove(&self, id: &CodebaseId) -> Result<bool> {
        match fs::remove_dir_all(self.codebase_root(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Summaries of every codebase on disk, newest first.
    pub async fn list_codebases(&self) -> Result<Vec<CodebaseSummary>> {
        let base = self.base_path.clone();
        blocking(move || {
            let mut summaries = Vec::new();
            for entry in std::fs::read_dir(&base)?.flatten() {
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                if !file_type.is_dir() {
                    continue;
                }
                let Some(id) = entry
                    .file_name()
                    .to_str()
                    .and_then(|name| CodebaseId::parse(name).ok())
                else {
                    continue;
                };
                if let Some(summary) = summarize(&entry.path(), id)? {
                    summaries.push(summary);
                }
            }
            summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(summaries)
        })
        .await
    }

    /// Resolve a relative path to an existing regular file inside the codebase.
    ///
    /// Containment is checked on the joined path and again after
    /// canonicalization, so symlinks cannot point outside the codebase.
    async fn resolve_file(&self, id: &CodebaseId, path: &RelativePath) -> Result<PathBuf> {
        let root = self.codebase_root(id);
        let full = path
            .resolve(&root)
            .map_err(|e| VaultError::InvalidPath(e.to_string()))?;

        let meta = match fs::metadata(&full).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(VaultError::NotFound("File".to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            return Err(VaultError::IsDirectory(path.to_string()));
        }

        let canonical_root = fs::canonicalize(&root).await?;
        let canonical = fs::canonicalize(&full).await?;
        if !is_strict_descendant(&canonical_root, &canonical) {
            tracing::warn!(codebase_id = %id, path = %path, "Resolved path escapes codebase root");
            return Err(VaultError::InvalidPath(path.to_string()));
        }

        Ok(canonical)
    }
}

/// Summary of one codebase directory, or `None` if it vanished meanwhile.
///
/// Rejected batches and the pending sweep remove directories at any time.
fn summarize(dir: &Path, id: CodebaseId) -> Result<Option<CodebaseSummary>> {
    let meta = match std::fs::metadata(dir) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(CodebaseSummary {
        directory_id: id,
        created_at: modified_time(&meta),
        file_count: count_files(dir) as i64,
    }))
}

/// Directories between `root` and `dir` (inclusive) that do not exist yet,
/// deepest first.
async fn missing_dirs(root: &Path, dir: &Path) -> Vec<PathBuf> {
    let mut missing = Vec::new();
    let mut current = dir;
    while current != root && current.starts_with(root) {
        if fs::symlink_metadata(current).await.is_ok() {
            break;
        }
        missing.push(current.to_path_buf());
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    missing
}

/// Remove directories left empty by a failed write, deepest first.
///
/// Stops at the first directory that is no longer empty, since a concurrent
/// write may have placed a file below it.
async fn prune_empty_dirs(dirs: &[PathBuf]) {
    for dir in dirs {
        match fs::remove_dir(dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::debug!(path = %dir.display(), error = %e, "Keeping directory after failed write");
                break;
            }
        }
    }
}

/// Walk a codebase root and collect regular files.
fn list_files(root: &Path) -> Result<Vec<FileEntry>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(path) = relative_slash_path(root, entry.path()) else {
            continue;
        };
        let size = entry.metadata().map_err(io::Error::from)?.len();
        files.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size,
            path,
        });
    }

    Ok(files)
}

fn count_files(root: &Path) -> usize {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

/// Root-relative path of `path` joined with forward slashes.
pub(crate) fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rest = path.strip_prefix(root).ok()?;
    let segments: Vec<_> = rest
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

fn modified_time(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now())
}

/// Run blocking filesystem work off the async runtime.
async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VaultError::Io(io::Error::other(e)))?
}
