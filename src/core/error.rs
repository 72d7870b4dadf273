//! Error handling for extrepo
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`RepoError`]) so batch operations can tell a
//!    deterministic failure (bad checksum, broken patch) from a transient one
//!    (network outage) and keep going with unrelated repositories.
//! 2. **User-friendly messages** ([`ErrorContext`]) with details and suggestions for
//!    the command-line front end.
//!
//! Every variant that concerns a dependency carries the repository `name` and the
//! `importpath`, plus the pin or patch that failed, so a message is never a bare
//! "fetch failed".
//!
//! # Examples
//!
//! ```rust,no_run
//! use extrepo::core::{RepoError, user_friendly_error};
//!
//! let err = RepoError::ChecksumMismatch {
//!     name: "errors_go_mod".to_string(),
//!     importpath: "github.com/pkg/errors".to_string(),
//!     pin: "version v0.8.1".to_string(),
//!     expected: "h1:aaa=".to_string(),
//!     actual: "h1:bbb=".to_string(),
//! };
//! assert!(!err.is_retryable());
//!
//! let ctx = user_friendly_error(anyhow::Error::from(err));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::core::file_error::FileOperationError;

/// The main error type for materialization, patching, generation and snapshots.
///
/// # Error Categories
///
/// ## Pin verification
/// - [`ChecksumMismatch`](RepoError::ChecksumMismatch): fatal, never retried
///
/// ## Fetching
/// - [`FetchUnavailable`](RepoError::FetchUnavailable): transient, retryable by the caller
/// - [`ToolNotFound`](RepoError::ToolNotFound): a required executable is missing
///
/// ## Patching
/// - [`PatchApplyFailure`](RepoError::PatchApplyFailure): fatal, a human must update
///   the patch or the pin
///
/// ## Declarations and directives
/// - [`AmbiguousDeclaration`](RepoError::AmbiguousDeclaration): zero or several pin modes
/// - [`InvalidDeclaration`](RepoError::InvalidDeclaration), [`DuplicateName`](RepoError::DuplicateName)
/// - [`DirectiveParseError`](RepoError::DirectiveParseError): fatal for its scope only
///
/// ## Artifacts
/// - [`SnapshotParseError`](RepoError::SnapshotParseError), [`ManifestParseError`](RepoError::ManifestParseError)
/// - [`CacheError`](RepoError::CacheError), [`GenerateError`](RepoError::GenerateError)
#[derive(Error, Debug)]
pub enum RepoError {
    /// Fetched content does not match the declared pin.
    #[error(
        "Checksum mismatch for '{name}' ({importpath}) at {pin}: expected {expected}, got {actual}"
    )]
    ChecksumMismatch {
        /// Repository name
        name: String,
        /// Declared import path
        importpath: String,
        /// Human-readable pin description (e.g. `version v0.8.1`)
        pin: String,
        /// The declared checksum
        expected: String,
        /// The checksum computed from the fetched content
        actual: String,
    },

    /// Network or VCS failure while fetching.
    #[error("Failed to fetch '{name}' ({importpath}) at {pin}: {reason}")]
    FetchUnavailable {
        /// Repository name
        name: String,
        /// Declared import path
        importpath: String,
        /// Human-readable pin description
        pin: String,
        /// Underlying failure
        reason: String,
    },

    /// A patch did not apply cleanly.
    #[error("Patch '{patch}' failed to apply to '{name}' ({importpath}): {reason}")]
    PatchApplyFailure {
        /// Repository name
        name: String,
        /// Declared import path
        importpath: String,
        /// The patch reference as declared
        patch: String,
        /// Output of the patch tool or the I/O failure
        reason: String,
    },

    /// Zero or more than one pin mode was populated.
    #[error("Ambiguous declaration for '{name}' ({importpath}): {reason}")]
    AmbiguousDeclaration {
        /// Repository name (derived when not given)
        name: String,
        /// Declared import path
        importpath: String,
        /// What is wrong with the pin
        reason: String,
    },

    /// A declaration is structurally invalid (bad version, bad commit, bad name...).
    #[error("Invalid declaration for '{name}': {reason}")]
    InvalidDeclaration {
        /// Repository name
        name: String,
        /// Validation failure
        reason: String,
    },

    /// Two declarations share the same name.
    #[error("Repository name '{name}' is declared more than once")]
    DuplicateName {
        /// The duplicated name
        name: String,
    },

    /// Malformed directive syntax.
    #[error("Invalid directive '{line}' in scope '{scope}' for '{name}': {reason}")]
    DirectiveParseError {
        /// Repository whose directive set is unusable
        name: String,
        /// The scope the directive appeared in (`global`, a repository name, or a directory)
        scope: String,
        /// The offending line
        line: String,
        /// Why it was rejected
        reason: String,
    },

    /// A snapshot artifact could not be parsed back.
    #[error("Invalid repository config snapshot at line {line}: {reason}")]
    SnapshotParseError {
        /// 1-based line number
        line: usize,
        /// Why it was rejected
        reason: String,
    },

    /// The declaration manifest could not be parsed.
    #[error("Invalid manifest {file}: {reason}")]
    ManifestParseError {
        /// Manifest path
        file: String,
        /// Parser message
        reason: String,
    },

    /// No manifest was found.
    #[error("No extrepo.toml found in {start} or any parent directory")]
    ManifestNotFound {
        /// Directory where the search started
        start: String,
    },

    /// A repository name is not declared.
    #[error("Repository '{name}' is not declared in the manifest")]
    UnknownRepository {
        /// The requested name
        name: String,
        /// Closest declared name, if any is close
        suggestion: Option<String>,
    },

    /// A required external tool is not installed.
    #[error("Required tool '{tool}' was not found in PATH")]
    ToolNotFound {
        /// Executable name
        tool: String,
    },

    /// External tool exited unsuccessfully.
    #[error("Command '{command}' failed: {stderr}")]
    ToolCommandError {
        /// Command line that failed
        command: String,
        /// Captured standard error
        stderr: String,
    },

    /// Cache store failure (lock, marker, rename...).
    #[error("Cache error for '{name}': {reason}")]
    CacheError {
        /// Repository name
        name: String,
        /// What failed
        reason: String,
    },

    /// Build metadata generation failed for a repository.
    #[error("Build metadata generation failed for '{name}': {reason}")]
    GenerateError {
        /// Repository name
        name: String,
        /// What failed
        reason: String,
    },

    /// File operation with context.
    #[error(transparent)]
    FileError(#[from] FileOperationError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl RepoError {
    /// Whether the surrounding orchestrator may retry the failed operation.
    ///
    /// Only network/VCS unavailability is transient. A checksum mismatch is
    /// deterministic and retrying cannot change the outcome.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchUnavailable { .. })
    }

    /// Name of the repository this error concerns, when there is one.
    #[must_use]
    pub fn repository(&self) -> Option<&str> {
        match self {
            Self::ChecksumMismatch { name, .. }
            | Self::FetchUnavailable { name, .. }
            | Self::PatchApplyFailure { name, .. }
            | Self::AmbiguousDeclaration { name, .. }
            | Self::InvalidDeclaration { name, .. }
            | Self::DuplicateName { name }
            | Self::DirectiveParseError { name, .. }
            | Self::UnknownRepository { name, .. }
            | Self::CacheError { name, .. }
            | Self::GenerateError { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Shorthand for [`RepoError::Other`].
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// Error wrapper with optional details and suggestion for CLI display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: RepoError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no details or suggestion.
    #[must_use]
    pub const fn new(error: RepoError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with actionable suggestions.
///
/// Recognizes [`RepoError`] (directly or anywhere in the `anyhow` chain),
/// [`std::io::Error`] and [`toml::de::Error`]; everything else is reported with
/// its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(repo_error) = cause.downcast_ref::<RepoError>() {
            return create_error_context(repo_error);
        }
    }

    if error
        .downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied)
    {
        return ErrorContext::new(RepoError::other(error.to_string()))
            .with_suggestion("Check ownership and permissions of the cache directory")
            .with_details("The cache store must stay writable for later build steps");
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(RepoError::ManifestParseError {
            file: "extrepo.toml".to_string(),
            reason: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax: quotes, brackets and [[repository]] tables");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(RepoError::Other {
        message,
    })
}

/// Map a [`RepoError`] to a context with tailored suggestions.
fn create_error_context(error: &RepoError) -> ErrorContext {
    // RepoError holds io::Error and is not Clone; re-render into an owned copy.
    let owned = clone_for_display(error);
    match error {
        RepoError::ChecksumMismatch { .. } => ErrorContext::new(owned)
            .with_details("The fetched content differs from the pinned checksum; retrying will not help")
            .with_suggestion("Verify the sum for this version (e.g. `go mod download -json`) and update the declaration"),
        RepoError::FetchUnavailable { .. } => ErrorContext::new(owned)
            .with_details("This failure is usually transient (network, proxy or VCS host)")
            .with_suggestion("Check connectivity and the module proxy setting, then run the command again"),
        RepoError::PatchApplyFailure { .. } => ErrorContext::new(owned)
            .with_details("A patch that does not apply cleanly is never skipped")
            .with_suggestion("Regenerate the patch against the pinned tree or change the pin"),
        RepoError::AmbiguousDeclaration { .. } => ErrorContext::new(owned).with_suggestion(
            "Declare exactly one of: version + sum, commit, or urls + sha256",
        ),
        RepoError::DirectiveParseError { .. } => ErrorContext::new(owned)
            .with_suggestion("Directives look like `gazelle:exclude vendor` or `repo <name>`"),
        RepoError::ToolNotFound { tool } => {
            let tool = tool.clone();
            ErrorContext::new(owned)
                .with_suggestion(format!("Install '{tool}' and make sure it is on PATH"))
        }
        RepoError::DuplicateName { .. } => ErrorContext::new(owned)
            .with_suggestion("Give each declaration a unique `name`"),
        RepoError::ManifestNotFound { .. } => ErrorContext::new(owned)
            .with_suggestion("Create an extrepo.toml or pass --manifest-path"),
        RepoError::UnknownRepository { suggestion: Some(close), .. } => {
            let close = close.clone();
            ErrorContext::new(owned).with_suggestion(format!("Did you mean '{close}'?"))
        }
        _ => ErrorContext::new(owned),
    }
}

pub(crate) fn clone_for_display(error: &RepoError) -> RepoError {
    match error {
        RepoError::ChecksumMismatch {
            name,
            importpath,
            pin,
            expected,
            actual,
        } => RepoError::ChecksumMismatch {
            name: name.clone(),
            importpath: importpath.clone(),
            pin: pin.clone(),
            expected: expected.clone(),
            actual: actual.clone(),
        },
        RepoError::FetchUnavailable {
            name,
            importpath,
            pin,
            reason,
        } => RepoError::FetchUnavailable {
            name: name.clone(),
            importpath: importpath.clone(),
            pin: pin.clone(),
            reason: reason.clone(),
        },
        RepoError::PatchApplyFailure {
            name,
            importpath,
            patch,
            reason,
        } => RepoError::PatchApplyFailure {
            name: name.clone(),
            importpath: importpath.clone(),
            patch: patch.clone(),
            reason: reason.clone(),
        },
        RepoError::AmbiguousDeclaration {
            name,
            importpath,
            reason,
        } => RepoError::AmbiguousDeclaration {
            name: name.clone(),
            importpath: importpath.clone(),
            reason: reason.clone(),
        },
        RepoError::InvalidDeclaration {
            name,
            reason,
        } => RepoError::InvalidDeclaration {
            name: name.clone(),
            reason: reason.clone(),
        },
        RepoError::DuplicateName {
            name,
        } => RepoError::DuplicateName {
            name: name.clone(),
        },
        RepoError::DirectiveParseError {
            name,
            scope,
            line,
            reason,
        } => RepoError::DirectiveParseError {
            name: name.clone(),
            scope: scope.clone(),
            line: line.clone(),
            reason: reason.clone(),
        },
        RepoError::SnapshotParseError {
            line,
            reason,
        } => RepoError::SnapshotParseError {
            line: *line,
            reason: reason.clone(),
        },
        RepoError::ManifestParseError {
            file,
            reason,
        } => RepoError::ManifestParseError {
            file: file.clone(),
            reason: reason.clone(),
        },
        RepoError::ManifestNotFound {
            start,
        } => RepoError::ManifestNotFound {
            start: start.clone(),
        },
        RepoError::UnknownRepository {
            name,
            suggestion,
        } => RepoError::UnknownRepository {
            name: name.clone(),
            suggestion: suggestion.clone(),
        },
        RepoError::ToolNotFound {
            tool,
        } => RepoError::ToolNotFound {
            tool: tool.clone(),
        },
        RepoError::ToolCommandError {
            command,
            stderr,
        } => RepoError::ToolCommandError {
            command: command.clone(),
            stderr: stderr.clone(),
        },
        RepoError::CacheError {
            name,
            reason,
        } => RepoError::CacheError {
            name: name.clone(),
            reason: reason.clone(),
        },
        RepoError::GenerateError {
            name,
            reason,
        } => RepoError::GenerateError {
            name: name.clone(),
            reason: reason.clone(),
        },
        other => RepoError::Other {
            message: other.to_string(),
        },
    }
}
