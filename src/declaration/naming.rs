//! Repository and target naming.
//!
//! Repository names are derived from import paths by reversing the host labels
//! and flattening everything else to `_`:
//!
//! ```
//! use extrepo::declaration::naming::derive_name;
//!
//! assert_eq!(derive_name("github.com/pkg/errors"), "com_github_pkg_errors");
//! assert_eq!(derive_name("golang.org/x/sys"), "org_golang_x_sys");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Legacy flat library name.
pub const DEFAULT_LIBRARY: &str = "go_default_library";
/// Legacy flat test name.
pub const DEFAULT_TEST: &str = "go_default_test";

/// How targets inside a repository are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingConvention {
    /// Library named after the last import path element.
    Import,
    /// Every library is `go_default_library`, every test `go_default_test`.
    GoDefaultLibrary,
    /// `Import` names, plus a `go_default_library` alias for libraries.
    ImportAlias,
}

impl NamingConvention {
    /// Convention applied to external repositories when nothing overrides it.
    pub const EXTERNAL_DEFAULT: Self = Self::ImportAlias;

    /// Keyword as written in directives and manifests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::GoDefaultLibrary => "go_default_library",
            Self::ImportAlias => "import_alias",
        }
    }

    /// Name of the library target for a package.
    ///
    /// `importpath` is the package's full import path; `is_command` marks a
    /// `package main` directory whose library gets a `_lib` suffix.
    #[must_use]
    pub fn library_name(self, importpath: &str, is_command: bool) -> String {
        match self {
            Self::GoDefaultLibrary => DEFAULT_LIBRARY.to_string(),
            Self::Import | Self::ImportAlias => {
                let base = last_element(importpath);
                if is_command { format!("{base}_lib") } else { base.to_string() }
            }
        }
    }

    /// Name of the test target for a package.
    #[must_use]
    pub fn test_name(self, importpath: &str) -> String {
        match self {
            Self::GoDefaultLibrary => DEFAULT_TEST.to_string(),
            Self::Import | Self::ImportAlias => format!("{}_test", last_element(importpath)),
        }
    }

    /// Aliases emitted next to a library under this convention.
    #[must_use]
    pub fn library_aliases(self, library_name: &str) -> Vec<String> {
        match self {
            Self::ImportAlias if library_name != DEFAULT_LIBRARY => {
                vec![DEFAULT_LIBRARY.to_string()]
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamingConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "import" => Ok(Self::Import),
            "go_default_library" => Ok(Self::GoDefaultLibrary),
            "import_alias" => Ok(Self::ImportAlias),
            other => Err(format!(
                "unknown naming convention '{other}' (expected import, go_default_library or import_alias)"
            )),
        }
    }
}

/// Derive a repository name from an import path.
///
/// The host's dot-separated labels are reversed, the remaining path elements
/// appended, and every character that is not an ASCII letter or digit becomes `_`.
/// The result is lowercase.
#[must_use]
pub fn derive_name(importpath: &str) -> String {
    let lowered = importpath.trim_matches('/').to_lowercase();
    let mut components = lowered.split('/');
    let host = components.next().unwrap_or_default();

    let mut parts: Vec<&str> = host.split('.').rev().collect();
    parts.extend(components);

    parts
        .join("_")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Last `/`-separated element of an import path.
#[must_use]
pub fn last_element(importpath: &str) -> &str {
    let trimmed = importpath.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Whether a repository name is a valid external repository name.
#[must_use]
pub fn is_valid_repo_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
