//! The `extrepo.toml` declaration registry.
//!
//! ```toml
//! directives = [
//!     "gazelle:repo com_github_apex_log",
//!     "gazelle:exclude handlers",
//! ]
//!
//! [[repository]]
//! name = "errors_go_mod"
//! importpath = "github.com/pkg/errors"
//! version = "v0.8.1"
//! sum = "h1:iURUrRGxPUNPdy5/HRSm+Yj6okJ6UtLINN0Q9M4+h3I="
//!
//! [[repository]]
//! name = "errors_go_git"
//! importpath = "github.com/pkg/errors"
//! commit = "816c9085562cd7ee03e7f8188a1cfd942858cded"
//! patches = ["//third_party:errors.patch"]
//! patch_args = ["-p1"]
//! build_naming_convention = "go_default_library"
//! ```
//!
//! `directives` is the ordered directive stream; `repo <name>` lines scope the
//! lines after them to one repository. Each `[[repository]]` table is a
//! [`DeclarationSpec`]. Relative patch paths resolve against the manifest's
//! directory.
//!
//! Loading is strict about structure (TOML syntax, unknown fields, duplicate
//! names) and lenient about individual declarations: a declaration that fails
//! validation is kept in [`Manifest::rejected`] so that batch operations can report
//! it next to the repositories that did materialize.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use strsim::levenshtein;

use crate::constants::MANIFEST_FILE_NAME;
use crate::core::error::clone_for_display;
use crate::core::{FileOperation, FileResultExt, RepoError};
use crate::declaration::{DeclarationSpec, DependencyDeclaration};
use crate::directive::DirectiveStream;
use crate::snapshot::Snapshot;

/// Maximum edit distance, as a percentage of the requested name, for suggestions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// On-disk shape of `extrepo.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestFile {
    /// Ordered directive stream
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<String>,
    /// Repository declarations
    #[serde(default, rename = "repository", skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<DeclarationSpec>,
}

/// A loaded and validated declaration registry.
#[derive(Debug)]
pub struct Manifest {
    /// File the manifest was loaded from, if any
    pub path: Option<PathBuf>,
    /// Directory relative paths resolve against
    pub base_dir: PathBuf,
    /// Raw directive lines
    pub directives: Vec<String>,
    /// Parsed directive stream
    pub stream: DirectiveStream,
    /// Valid declarations in manifest order
    pub declarations: Vec<DependencyDeclaration>,
    /// Declarations that failed validation, in manifest order
    pub rejected: Vec<RepoError>,
}

impl Manifest {
    /// Load `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_file_context(
            FileOperation::Read,
            path,
            "reading manifest",
        )?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));

        let mut manifest = Self::from_toml_str(&content, &base_dir, &path.display().to_string())
            .with_context(|| format!("Failed to load manifest {}", path.display()))?;
        manifest.path = Some(path.to_path_buf());
        Ok(manifest)
    }

    /// Parse manifest text. `label` names the source in errors.
    pub fn from_toml_str(content: &str, base_dir: &Path, label: &str) -> Result<Self, RepoError> {
        let file: ManifestFile =
            toml::from_str(content).map_err(|e| RepoError::ManifestParseError {
                file: label.to_string(),
                reason: e.to_string(),
            })?;
        Self::from_file(file, base_dir)
    }

    /// Validate a parsed [`ManifestFile`].
    pub fn from_file(file: ManifestFile, base_dir: &Path) -> Result<Self, RepoError> {
        let mut seen = BTreeSet::new();
        for spec in &file.repositories {
            let name = spec.effective_name();
            if !seen.insert(name.clone()) {
                return Err(RepoError::DuplicateName { name });
            }
        }

        let mut declarations = Vec::new();
        let mut rejected = Vec::new();
        for spec in &file.repositories {
            match DependencyDeclaration::from_spec(spec, base_dir) {
                Ok(decl) => declarations.push(decl),
                Err(err) => {
                    tracing::warn!(target: "manifest", "{err}");
                    rejected.push(err);
                }
            }
        }

        let stream = DirectiveStream::parse(&file.directives);
        Ok(Self {
            path: None,
            base_dir: base_dir.to_path_buf(),
            directives: file.directives,
            stream,
            declarations,
            rejected,
        })
    }

    /// Rebuild an unpinned registry from a snapshot.
    ///
    /// The result knows names, import paths and naming conventions: enough to
    /// resolve imports and to re-render the same snapshot, not enough to fetch.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let directives: Vec<String> = snapshot.directives.iter().map(ToString::to_string).collect();
        let declarations = snapshot
            .entries
            .iter()
            .map(|e| {
                DependencyDeclaration::unpinned(&e.name, &e.importpath, e.build_naming_convention)
            })
            .collect();
        Self {
            path: None,
            base_dir: PathBuf::from("."),
            stream: DirectiveStream::parse(&directives),
            directives,
            declarations,
            rejected: Vec::new(),
        }
    }

    /// Names of the `repo` scopes in the directive stream.
    #[must_use]
    pub fn repo_scopes(&self) -> &[String] {
        self.stream.repo_names()
    }

    /// Declaration named `name`.
    pub fn get(&self, name: &str) -> Result<&DependencyDeclaration, RepoError> {
        self.declarations.iter().find(|d| d.name == name).ok_or_else(|| {
            if let Some(err) = self.rejected.iter().find(|e| e.repository() == Some(name)) {
                return clone_for_display(err);
            }
            RepoError::UnknownRepository {
                name: name.to_string(),
                suggestion: self.closest_name(name),
            }
        })
    }

    /// Declarations named in `names`, in that order; every declaration when empty.
    pub fn select(&self, names: &[String]) -> Result<Vec<&DependencyDeclaration>, RepoError> {
        if names.is_empty() {
            return Ok(self.declarations.iter().collect());
        }
        names.iter().map(|n| self.get(n)).collect()
    }

    fn closest_name(&self, target: &str) -> Option<String> {
        self.declarations
            .iter()
            .map(|d| (levenshtein(target, &d.name), &d.name))
            .filter(|(distance, _)| *distance <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
            .min()
            .map(|(_, name)| name.clone())
    }
}

/// Search `start` and its parents for `extrepo.toml`.
pub fn find_manifest_from(start: &Path) -> Result<PathBuf, RepoError> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(MANIFEST_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        dir = current.parent();
    }
    Err(RepoError::ManifestNotFound {
        start: start.display().to_string(),
    })
}

/// Use `explicit` when given, otherwise search from the working directory.
pub fn find_manifest_with_optional(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) if path.is_file() => Ok(path),
        Some(path) => Err(RepoError::ManifestParseError {
            file: path.display().to_string(),
            reason: "file does not exist".to_string(),
        }
        .into()),
        None => {
            let cwd = std::env::current_dir().context("Cannot determine current working directory")?;
            Ok(find_manifest_from(&cwd)?)
        }
    }
}
