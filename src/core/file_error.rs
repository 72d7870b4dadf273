//! File system errors that remember what was being done and why.
//!
//! Cache and snapshot code touches many paths; a bare `io::Error` says
//! "No such file or directory" without naming the file. [`FileResultExt`] attaches
//! the operation, path and purpose at the call site.

use std::path::PathBuf;
use thiserror::Error;

/// Kind of file system operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    /// Reading a file
    Read,
    /// Writing a file
    Write,
    /// Creating a directory tree
    CreateDir,
    /// Removing a file or directory tree
    Remove,
    /// Renaming/moving into place
    Rename,
    /// Reading or changing permissions
    Permissions,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self {
            Self::Read => "reading",
            Self::Write => "writing",
            Self::CreateDir => "creating directory",
            Self::Remove => "removing",
            Self::Rename => "renaming",
            Self::Permissions => "updating permissions of",
        };
        f.write_str(verb)
    }
}

/// A failed file operation with its path and purpose.
#[derive(Error, Debug)]
#[error("Failed {operation} '{}' ({purpose}): {source}", file_path.display())]
pub struct FileOperationError {
    /// The operation that failed
    pub operation: FileOperation,
    /// The path being accessed
    pub file_path: PathBuf,
    /// Why the path was being accessed
    pub purpose: String,
    /// The underlying IO error
    #[source]
    pub source: std::io::Error,
}

impl FileOperationError {
    /// Whether the failure was a permissions problem.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.source.kind() == std::io::ErrorKind::PermissionDenied
    }
}

/// Extension trait for attaching file context to `io::Result`.
pub trait FileResultExt<T> {
    /// Wrap the error with the operation, path and purpose.
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
    ) -> Result<T, FileOperationError>;
}

impl<T> FileResultExt<T> for std::io::Result<T> {
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
    ) -> Result<T, FileOperationError> {
        self.map_err(|source| FileOperationError {
            operation,
            file_path: file_path.into(),
            purpose: purpose.into(),
            source,
        })
    }
}
