//! Cross-repository import resolution.
//!
//! An [`ImportIndex`] maps repository import paths to declarations. An import is
//! resolved to the declaration with the longest import path that is the import
//! itself or one of its `/`-separated prefixes. Several declarations may share an
//! import path; the one named like [`derive_name`] of the path wins, otherwise the
//! lexicographically smallest name.

use std::collections::BTreeMap;

use super::label::Label;
use crate::declaration::{DependencyDeclaration, NamingConvention, derive_name};
use crate::directive::DirectiveStream;

/// One resolvable repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Repository name
    pub name: String,
    /// Declared import path of the repository root
    pub importpath: String,
    /// Effective naming convention of the repository's targets
    pub naming_convention: NamingConvention,
}

/// Import path to repository lookup table.
#[derive(Debug, Clone, Default)]
pub struct ImportIndex {
    by_importpath: BTreeMap<String, IndexEntry>,
}

impl ImportIndex {
    /// Build from entries, applying the duplicate import path rule.
    pub fn new(entries: impl IntoIterator<Item = IndexEntry>) -> Self {
        let mut by_importpath: BTreeMap<String, IndexEntry> = BTreeMap::new();
        for entry in entries {
            match by_importpath.get(&entry.importpath) {
                Some(current) if !prefers(&entry, current) => {}
                _ => {
                    by_importpath.insert(entry.importpath.clone(), entry);
                }
            }
        }
        Self { by_importpath }
    }

    /// Index a declaration set, using each repository's resolved naming convention.
    ///
    /// A repository whose directives fail to resolve falls back to its own
    /// declared convention; the failure surfaces when that repository is processed.
    pub fn from_declarations(decls: &[DependencyDeclaration], stream: &DirectiveStream) -> Self {
        Self::new(decls.iter().map(|decl| IndexEntry {
            name: decl.name.clone(),
            importpath: decl.importpath.clone(),
            naming_convention: stream
                .resolve(decl)
                .map(|r| r.naming_convention)
                .unwrap_or_else(|_| decl.naming_convention()),
        }))
    }

    /// Number of distinct import paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_importpath.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_importpath.is_empty()
    }

    /// Repository providing `import`, by longest import path prefix.
    #[must_use]
    pub fn lookup(&self, import: &str) -> Option<&IndexEntry> {
        let mut candidate = import;
        loop {
            if let Some(entry) = self.by_importpath.get(candidate) {
                return Some(entry);
            }
            candidate = &candidate[..candidate.rfind('/')?];
        }
    }

    /// Label of the library providing `import` in another repository.
    #[must_use]
    pub fn resolve(&self, import: &str) -> Option<Label> {
        let entry = self.lookup(import)?;
        let rel = import
            .strip_prefix(entry.importpath.as_str())
            .map(|r| r.trim_start_matches('/'))
            .unwrap_or_default();
        let name = entry.naming_convention.library_name(import, false);
        Some(Label::external(entry.name.clone(), rel, name))
    }
}

/// Whether `candidate` should replace `current` for the same import path.
fn prefers(candidate: &IndexEntry, current: &IndexEntry) -> bool {
    let derived = derive_name(&candidate.importpath);
    match (candidate.name == derived, current.name == derived) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate.name < current.name,
    }
}

/// Visibility of a package at repository-relative `rel`.
///
/// Packages under an `internal` directory are visible to the subtree rooted at
/// that directory's parent.
#[must_use]
pub fn visibility_for(rel: &str) -> String {
    let parts: Vec<&str> = if rel.is_empty() { Vec::new() } else { rel.split('/').collect() };
    match parts.iter().rposition(|p| *p == "internal") {
        Some(idx) => format!("//{}:__subpackages__", parts[..idx].join("/")),
        None => "//visibility:public".to_string(),
    }
}
