//! Effective directive configuration for one directory.
//!
//! A [`DirectiveScope`] is built for the repository root and then derived for
//! each visited directory with [`DirectiveScope::child`]. Children are new values;
//! a parent is never modified, so directives found in one directory cannot leak
//! into its siblings or its parent.

use glob::{MatchOptions, Pattern};
use serde::Serialize;

use super::{Directive, keys};
use crate::declaration::NamingConvention;

/// Whether test targets are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoTestMode {
    /// No test targets.
    #[default]
    None,
    /// One test target per package.
    Package,
}

impl std::str::FromStr for GoTestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(Self::None),
            "package" => Ok(Self::Package),
            other => Err(format!("unknown go_test mode '{other}' (expected none or package)")),
        }
    }
}

/// An `exclude` pattern anchored at the directory that declared it.
#[derive(Debug, Clone)]
pub struct ExcludePattern {
    anchored: String,
    glob: Option<Pattern>,
}

impl ExcludePattern {
    /// Anchor `raw` at directory `dir` (repository-relative, `""` for the root).
    #[must_use]
    pub fn new(dir: &str, raw: &str) -> Self {
        let raw = raw.trim().trim_start_matches("./").trim_end_matches('/');
        let anchored = join_rel(dir, raw);
        let glob = if anchored.contains(['*', '?', '[']) {
            Pattern::new(&anchored).ok()
        } else {
            None
        };
        Self { anchored, glob }
    }

    /// Pattern text after anchoring.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.anchored
    }

    /// Whether the repository-relative path `rel` is excluded.
    ///
    /// A literal pattern excludes the path itself and everything beneath it.
    #[must_use]
    pub fn matches(&self, rel: &str) -> bool {
        if rel == self.anchored
            || rel.strip_prefix(self.anchored.as_str()).is_some_and(|rest| rest.starts_with('/'))
        {
            return true;
        }
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.glob.as_ref().is_some_and(|g| g.matches_with(rel, options))
    }
}

/// Directive-derived settings in effect for one directory.
#[derive(Debug, Clone)]
pub struct DirectiveScope {
    /// Directory relative to the repository root (`""` for the root)
    pub rel: String,
    /// Import path prefix in effect
    pub prefix: String,
    /// Directory where `prefix` was set
    pub prefix_rel: String,
    /// Target naming convention
    pub naming_convention: NamingConvention,
    /// Test target generation
    pub go_test: GoTestMode,
    /// Build file names recognized in this subtree
    pub build_file_names: Vec<String>,
    /// Active exclusions
    pub excludes: Vec<ExcludePattern>,
    /// Sources of this directory are skipped; not inherited
    pub ignore: bool,
    /// Every directive in effect, in application order
    pub directives: Vec<Directive>,
}

impl DirectiveScope {
    /// Scope for the repository root.
    #[must_use]
    pub fn root(
        importpath: &str,
        naming_convention: NamingConvention,
        build_file_names: Vec<String>,
        directives: &[Directive],
    ) -> Self {
        let mut scope = Self {
            rel: String::new(),
            prefix: importpath.to_string(),
            prefix_rel: String::new(),
            naming_convention,
            go_test: GoTestMode::None,
            build_file_names,
            excludes: Vec::new(),
            ignore: false,
            directives: Vec::new(),
        };
        for directive in directives {
            scope.apply(directive);
        }
        scope
    }

    /// Derive the scope of subdirectory `rel` with its local directives.
    #[must_use]
    pub fn child(&self, rel: &str, local: &[Directive]) -> Self {
        let mut scope = self.clone();
        scope.rel = rel.to_string();
        scope.ignore = false;
        for directive in local {
            scope.apply(directive);
        }
        scope
    }

    fn apply(&mut self, directive: &Directive) {
        let value = directive.value.as_deref().unwrap_or("");
        match directive.key.as_str() {
            keys::EXCLUDE => self.excludes.push(ExcludePattern::new(&self.rel, value)),
            keys::PREFIX => {
                self.prefix = value.to_string();
                self.prefix_rel = self.rel.clone();
            }
            keys::BUILD_FILE_NAME => {
                let names: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect();
                if !names.is_empty() {
                    self.build_file_names = names;
                }
            }
            keys::GO_NAMING_CONVENTION => {
                if let Ok(convention) = value.parse() {
                    self.naming_convention = convention;
                }
            }
            keys::GO_TEST => {
                if let Ok(mode) = value.parse() {
                    self.go_test = mode;
                }
            }
            keys::IGNORE => self.ignore = true,
            _ => {}
        }
        self.directives.push(directive.clone());
    }

    /// Whether `rel` (a directory or file path) is excluded by this scope.
    #[must_use]
    pub fn is_excluded(&self, rel: &str) -> bool {
        self.excludes.iter().any(|e| e.matches(rel))
    }

    /// Import path of the package in this scope's directory.
    #[must_use]
    pub fn importpath(&self) -> String {
        let tail = if self.prefix_rel.is_empty() {
            self.rel.as_str()
        } else if self.rel == self.prefix_rel {
            ""
        } else {
            self.rel
                .strip_prefix(self.prefix_rel.as_str())
                .and_then(|r| r.strip_prefix('/'))
                .unwrap_or(self.rel.as_str())
        };
        join_rel(&self.prefix, tail)
    }

    /// Values of all directives with `key`, in application order.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.directives
            .iter()
            .filter(move |d| d.key == key)
            .filter_map(|d| d.value.as_deref())
    }
}

/// Join two `/`-separated relative paths, either of which may be empty.
#[must_use]
pub fn join_rel(base: &str, tail: &str) -> String {
    match (base.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{tail}"),
    }
}
