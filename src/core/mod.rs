//! Core error types for extrepo.
//!
//! - [`RepoError`]: the typed failure taxonomy shared by every component
//! - [`ErrorContext`] / [`user_friendly_error`]: CLI-facing rendering with suggestions
//! - [`FileOperationError`] / [`FileResultExt`]: path-aware I/O failures
//!
//! Library code returns `Result<T, RepoError>` where a caller must branch on the
//! failure kind (batch reporting, retry decisions) and `anyhow::Result` at the
//! outer boundaries.

pub mod error;
pub mod file_error;

pub use error::{ErrorContext, RepoError, user_friendly_error};
pub use file_error::{FileOperation, FileOperationError, FileResultExt};
