//! Directives: `gazelle:key value` lines that adjust build metadata generation.
//!
//! Directives come from three places:
//!
//! - the manifest's top-level `directives` list, parsed into a [`DirectiveStream`]
//!   whose `repo <name>` lines open per-repository scopes;
//! - a declaration's own `build_directives`;
//! - comments in the fetched tree (`# gazelle:...` in build files, leading
//!   `// gazelle:...` comments in `.go` files), which become a directory-local
//!   [`DirectiveScope`] during the walk.
//!
//! The `gazelle:` prefix is optional in manifest input and required in source
//! comments. Unknown keys are kept as-is.

pub mod scope;
pub mod stream;

pub use scope::{DirectiveScope, ExcludePattern, GoTestMode};
pub use stream::{DirectiveStream, RepositoryDirectives};

use serde::Serialize;
use std::fmt;

use crate::declaration::NamingConvention;

/// Prefix that marks a directive.
pub const DIRECTIVE_PREFIX: &str = "gazelle:";

/// Directive keys with built-in meaning.
pub mod keys {
    /// Opens a per-repository scope in a directive stream.
    pub const REPO: &str = "repo";
    /// Excludes a path or glob from generation.
    pub const EXCLUDE: &str = "exclude";
    /// Sets the import path prefix for a subtree.
    pub const PREFIX: &str = "prefix";
    /// Comma-separated build file names.
    pub const BUILD_FILE_NAME: &str = "build_file_name";
    /// Target naming convention.
    pub const GO_NAMING_CONVENTION: &str = "go_naming_convention";
    /// Test target generation (`none` or `package`).
    pub const GO_TEST: &str = "go_test";
    /// Skip the sources of this directory (subdirectories are still visited).
    pub const IGNORE: &str = "ignore";
}

/// One parsed directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
    /// Directive key (e.g. `exclude`)
    pub key: String,
    /// Value, if any (e.g. `handlers`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Directive {
    /// Construct a directive.
    pub fn new(key: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            key: key.into(),
            value: value.map(str::to_string),
        }
    }

    /// Parse a manifest directive line. The `gazelle:` prefix is optional.
    ///
    /// Returns `Ok(None)` for blank lines and `#` comments.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        let body = trimmed.strip_prefix(DIRECTIVE_PREFIX).unwrap_or(trimmed);
        Self::parse_body(body).map(Some)
    }

    /// Parse a source comment line (`# gazelle:...` or `// gazelle:...`).
    ///
    /// Returns `Ok(None)` when the line is not a directive comment.
    pub fn parse_comment(line: &str) -> Result<Option<Self>, String> {
        let trimmed = line.trim();
        let comment = if let Some(rest) = trimmed.strip_prefix("//") {
            rest
        } else if let Some(rest) = trimmed.strip_prefix('#') {
            rest
        } else {
            return Ok(None);
        };
        match comment.trim_start().strip_prefix(DIRECTIVE_PREFIX) {
            Some(body) => Self::parse_body(body).map(Some),
            None => Ok(None),
        }
    }

    fn parse_body(body: &str) -> Result<Self, String> {
        let body = body.trim();
        let (key, value) = match body.split_once(char::is_whitespace) {
            Some((key, value)) => (key, Some(value.trim()).filter(|v| !v.is_empty())),
            None => (body, None),
        };

        if key.is_empty() {
            return Err("missing directive key".to_string());
        }
        if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!("invalid directive key '{key}'"));
        }

        let directive = Self::new(key, value);
        directive.validate()?;
        Ok(directive)
    }

    /// Check the value of built-in keys. Unknown keys always pass.
    fn validate(&self) -> Result<(), String> {
        let value = self.value.as_deref();
        match self.key.as_str() {
            keys::REPO | keys::EXCLUDE | keys::BUILD_FILE_NAME => {
                if value.is_none() {
                    return Err(format!("'{}' requires a value", self.key));
                }
                if self.key == keys::REPO && value.is_some_and(|v| v.contains(char::is_whitespace)) {
                    return Err("'repo' takes a single repository name".to_string());
                }
            }
            keys::GO_NAMING_CONVENTION => {
                let raw = value.ok_or("'go_naming_convention' requires a value")?;
                raw.parse::<NamingConvention>()?;
            }
            keys::GO_TEST => {
                let raw = value.ok_or("'go_test' requires a value")?;
                raw.parse::<GoTestMode>()?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{DIRECTIVE_PREFIX}{} {value}", self.key),
            None => write!(f, "{DIRECTIVE_PREFIX}{}", self.key),
        }
    }
}
