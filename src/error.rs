//! Error types for codevault.

use thiserror::Error;

/// Common error type for codevault.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Database error.
    ///
    /// Wraps errors from whichever sqlx backend is compiled in.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Codebase identifier is not a canonical UUID.
    #[error("invalid codebase id: {0}")]
    InvalidCodebaseId(String),

    /// Client-supplied relative path was rejected by the sanitizer.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// A directory was requested where a file was expected.
    #[error("{0} is a directory")]
    IsDirectory(String),

    /// Target already exists.
    #[error("{0} already exists")]
    Conflict(String),

    /// An upload batch ended with no stored files.
    #[error("no valid files were uploaded")]
    NoValidFiles,

    /// The storage tier failed or could not be reached.
    #[error("storage tier error: {0}")]
    Storage(String),

    /// ZIP encoding error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for VaultError {
    fn from(e: sqlx::Error) -> Self {
        VaultError::Database(e.to_string())
    }
}

impl From<zip::result::ZipError> for VaultError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => VaultError::Io(io),
            other => VaultError::Archive(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for VaultError {
    fn from(e: reqwest::Error) -> Self {
        VaultError::Storage(e.to_string())
    }
}

/// Result type alias for codevault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error_display() {
        let err = VaultError::NotFound("Codebase".to_string());
        assert_eq!(err.to_string(), "Codebase not found");
    }

    #[test]
    fn test_is_directory_display() {
        let err = VaultError::IsDirectory("src".to_string());
        assert_eq!(err.to_string(), "src is a directory");
    }

    #[test]
    fn test_no_valid_files_display() {
        assert_eq!(
            VaultError::NoValidFiles.to_string(),
            "no valid files were uploaded"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VaultError = io_err.into();
        assert!(matches!(err, VaultError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_zip_io_error_unwraps_to_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "client gone");
        let err: VaultError = zip::result::ZipError::Io(io_err).into();
        assert!(matches!(err, VaultError::Io(_)));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(VaultError::NoValidFiles)
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
