//! Client path sanitization.
//!
//! Every client-supplied relative path is normalized here before it is
//! allowed near the filesystem. The result is a [`RelativePath`], which is
//! the only path type the blob store accepts.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Reason a client path was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRejection {
    #[error("path is empty")]
    Empty,
    #[error("path contains a parent-directory segment")]
    Traversal,
    #[error("path contains an invalid character")]
    InvalidCharacter,
    #[error("path resolves outside the codebase root")]
    OutsideRoot,
}

/// A normalized, forward-slash separated path relative to a codebase root.
///
/// Guaranteed non-empty, free of `.`/`..` segments, NUL bytes and empty
/// segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(String);

impl RelativePath {
    /// The normalized path text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final segment of the path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Join onto `root`, requiring the result to be a strict descendant of it.
    pub fn resolve(&self, root: &Path) -> Result<PathBuf, PathRejection> {
        let joined = self
            .0
            .split('/')
            .fold(root.to_path_buf(), |acc, segment| acc.join(segment));

        if !is_strict_descendant(root, &joined) {
            return Err(PathRejection::OutsideRoot);
        }
        Ok(joined)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a client-supplied relative path.
///
/// Both `/` and `\` separate segments. Leading, repeated and trailing
/// separators and `.` segments are dropped; any `..` segment rejects the
/// whole path.
pub fn sanitize(raw: &str) -> Result<RelativePath, PathRejection> {
    let mut segments = Vec::new();

    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathRejection::Traversal),
            s if s.contains('\0') => return Err(PathRejection::InvalidCharacter),
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(PathRejection::Empty);
    }

    Ok(RelativePath(segments.join("/")))
}

/// Final segment of a declared file name, or `None` if it is empty, `.` or `..`.
pub fn base_name(declared: &str) -> Option<&str> {
    let name = declared.rsplit(['/', '\\']).next().unwrap_or(declared);
    match name {
        "" | "." | ".." => None,
        n => Some(n),
    }
}

/// Segment-wise containment: `path` lies under `root` and is not `root` itself.
pub(crate) fn is_strict_descendant(root: &Path, path: &Path) -> bool {
    let Ok(rest) = path.strip_prefix(root) else {
        return false;
    };
    let mut components = rest.components().peekable();
    if components.peek().is_none() {
        return false;
    }
    components.all(|c| matches!(c, Component::Normal(_)))
}
