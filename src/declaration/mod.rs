//! Dependency declarations, pins, and cache identities.
//!
//! A [`DeclarationSpec`] is the raw, serde-facing form of one `[[repository]]`
//! table. [`DependencyDeclaration::from_spec`] validates it: exactly one pin mode
//! must be populated and every field of that mode must be well formed.
//!
//! [`DependencyDeclaration::identity`] computes the [`DependencyIdentity`] used as
//! the cache key. It covers the import path, the pin, the *contents* of every
//! patch file and the patch arguments. The repository name is not part of it, so
//! two names with the same pin share a cache slot.

pub mod naming;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_BUILD_FILE_NAMES, DEFAULT_PATCH_ARGS};
use crate::core::RepoError;
pub use naming::{NamingConvention, derive_name};

/// Raw declaration as written in a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarationSpec {
    /// Repository name; derived from `importpath` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Go import path of the repository root.
    pub importpath: String,

    /// Module version (`v`-prefixed semver).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Module `h1:` checksum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<String>,

    /// VCS commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// VCS remote; defaults to `https://{importpath}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// VCS kind; only `git` is supported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs: Option<String>,
    /// Original import path of a fork.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<String>,

    /// Archive mirrors, tried in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    /// SHA-256 of the archive bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Leading directory removed from archive members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_prefix: Option<String>,

    /// Patch files, applied in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<String>,
    /// Arguments passed to `patch`; defaults to `-p0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_args: Option<Vec<String>>,

    /// Naming convention for generated targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_naming_convention: Option<String>,
    /// Directives applied to the repository root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_directives: Vec<String>,
    /// `auto`, `on`, or `off`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_file_generation: Option<String>,
    /// Build file names recognized in the fetched tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_file_names: Option<Vec<String>>,
}

impl DeclarationSpec {
    /// The name this spec will carry once validated: trimmed, or derived from
    /// the trimmed importpath.
    #[must_use]
    pub fn effective_name(&self) -> String {
        match &self.name {
            Some(n) => n.trim().to_string(),
            None => derive_name(self.importpath.trim()),
        }
    }
}

/// How a dependency is pinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Pin {
    /// Module version fetched from a module proxy.
    Module {
        /// `v`-prefixed semantic version
        version: String,
        /// `h1:` dirhash
        sum: String,
    },
    /// Exact VCS commit.
    Vcs {
        /// 40-character lowercase hex commit
        commit: String,
        /// Clone URL
        remote: String,
        /// VCS kind (`git`)
        vcs: String,
        /// Original import path when this is a fork
        replace: Option<String>,
    },
    /// Archive with a pinned content hash.
    Archive {
        /// Mirrors tried in order
        urls: Vec<String>,
        /// Lowercase hex SHA-256 of the archive bytes
        sha256: String,
        /// Leading directory to strip
        strip_prefix: Option<String>,
    },
    /// Known only by name and import path (reconstructed from a snapshot).
    Unpinned,
}

impl Pin {
    /// Short human-readable description for error messages and logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Module { version, .. } => format!("version {version}"),
            Self::Vcs { commit, .. } => format!("commit {commit}"),
            Self::Archive { sha256, .. } => format!("archive sha256:{sha256}"),
            Self::Unpinned => "no pin".to_string(),
        }
    }
}

/// Whether to generate build metadata for a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildFileGeneration {
    /// Generate unless the repository root already has a build file.
    #[default]
    Auto,
    /// Always generate.
    On,
    /// Never generate.
    Off,
}

impl std::str::FromStr for BuildFileGeneration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            other => Err(format!("unknown build_file_generation '{other}' (expected auto, on or off)")),
        }
    }
}

/// A validated dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyDeclaration {
    /// Unique repository name
    pub name: String,
    /// Declared import path
    pub importpath: String,
    /// The single pin mode
    pub pin: Pin,
    /// Patch files, resolved against the manifest directory
    pub patches: Vec<PathBuf>,
    /// Arguments passed uniformly to every patch invocation
    pub patch_args: Vec<String>,
    /// Explicit naming convention, if any
    pub build_naming_convention: Option<NamingConvention>,
    /// Raw directive lines from the declaration
    pub build_directives: Vec<String>,
    /// Generation mode
    pub build_file_generation: BuildFileGeneration,
    /// Recognized build file names
    pub build_file_names: Vec<String>,
}

impl DependencyDeclaration {
    /// Declaration with only a name and import path, as recovered from a snapshot.
    #[must_use]
    pub fn unpinned(
        name: impl Into<String>,
        importpath: impl Into<String>,
        build_naming_convention: Option<NamingConvention>,
    ) -> Self {
        Self {
            name: name.into(),
            importpath: importpath.into(),
            pin: Pin::Unpinned,
            patches: Vec::new(),
            patch_args: default_patch_args(),
            build_naming_convention,
            build_directives: Vec::new(),
            build_file_generation: BuildFileGeneration::Auto,
            build_file_names: default_build_file_names(),
        }
    }

    /// Validate a raw spec. Relative patch paths resolve against `base_dir`.
    pub fn from_spec(spec: &DeclarationSpec, base_dir: &Path) -> Result<Self, RepoError> {
        let importpath = spec.importpath.trim().to_string();
        let name = spec.effective_name();

        let invalid = |reason: String| RepoError::InvalidDeclaration {
            name: name.clone(),
            reason,
        };

        validate_importpath(&importpath).map_err(&invalid)?;
        if !naming::is_valid_repo_name(&name) {
            return Err(invalid(format!(
                "'{name}' is not a valid repository name (letters, digits, '_', '-', '.'; must start with a letter)"
            )));
        }

        let pin = select_pin(spec, &name, &importpath)?;

        let build_naming_convention = spec
            .build_naming_convention
            .as_deref()
            .map(str::parse::<NamingConvention>)
            .transpose()
            .map_err(&invalid)?;

        let build_file_generation = spec
            .build_file_generation
            .as_deref()
            .map(str::parse::<BuildFileGeneration>)
            .transpose()
            .map_err(&invalid)?
            .unwrap_or_default();

        let patches = spec
            .patches
            .iter()
            .map(|p| resolve_patch_ref(base_dir, p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(&invalid)?;

        let build_file_names = match &spec.build_file_names {
            Some(names) if names.is_empty() => {
                return Err(invalid("build_file_names must not be empty".to_string()));
            }
            Some(names) => names.clone(),
            None => default_build_file_names(),
        };

        Ok(Self {
            name,
            importpath,
            pin,
            patches,
            patch_args: spec.patch_args.clone().unwrap_or_else(default_patch_args),
            build_naming_convention,
            build_directives: spec.build_directives.clone(),
            build_file_generation,
            build_file_names,
        })
    }

    /// Compute the cache identity. Reads every patch file.
    ///
    /// A missing or unreadable patch is reported as [`RepoError::PatchApplyFailure`]
    /// naming that patch.
    pub async fn identity(&self) -> Result<DependencyIdentity, RepoError> {
        let mut patch_digests = Vec::with_capacity(self.patches.len());
        for patch in &self.patches {
            let bytes = tokio::fs::read(patch).await.map_err(|e| RepoError::PatchApplyFailure {
                name: self.name.clone(),
                importpath: self.importpath.clone(),
                patch: patch.display().to_string(),
                reason: format!("cannot read patch file: {e}"),
            })?;
            patch_digests.push(hex::encode(Sha256::digest(&bytes)));
        }
        self.identity_with_patch_digests(&patch_digests)
    }

    fn identity_with_patch_digests(
        &self,
        patch_digests: &[String],
    ) -> Result<DependencyIdentity, RepoError> {
        let mut hasher = Sha256::new();
        let mut line = |key: &str, value: &str| {
            hasher.update(key.as_bytes());
            hasher.update(b" ");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        };

        line("importpath", &self.importpath);
        match &self.pin {
            Pin::Module { version, sum } => {
                line("pin", "module");
                line("version", version);
                line("sum", sum);
            }
            Pin::Vcs { commit, vcs, replace, .. } => {
                line("pin", vcs);
                line("commit", commit);
                line("replace", replace.as_deref().unwrap_or(""));
            }
            Pin::Archive { sha256, strip_prefix, .. } => {
                line("pin", "archive");
                line("sha256", sha256);
                line("strip_prefix", strip_prefix.as_deref().unwrap_or(""));
            }
            Pin::Unpinned => {
                return Err(RepoError::AmbiguousDeclaration {
                    name: self.name.clone(),
                    importpath: self.importpath.clone(),
                    reason: "declaration has no pin and cannot be materialized".to_string(),
                });
            }
        }
        for digest in patch_digests {
            line("patch", digest);
        }
        line("patch_args", &self.patch_args.join("\u{0}"));

        Ok(DependencyIdentity(hex::encode(hasher.finalize())))
    }

    /// Naming convention in effect when nothing else overrides it.
    #[must_use]
    pub fn naming_convention(&self) -> NamingConvention {
        self.build_naming_convention.unwrap_or(NamingConvention::EXTERNAL_DEFAULT)
    }
}

/// Stable cache key for a pinned, patched dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyIdentity(String);

impl DependencyIdentity {
    /// Wrap an already computed hex digest.
    #[must_use]
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for DependencyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_patch_args() -> Vec<String> {
    DEFAULT_PATCH_ARGS.iter().map(|s| (*s).to_string()).collect()
}

fn default_build_file_names() -> Vec<String> {
    DEFAULT_BUILD_FILE_NAMES.iter().map(|s| (*s).to_string()).collect()
}

fn validate_importpath(importpath: &str) -> Result<(), String> {
    if importpath.is_empty() {
        return Err("importpath must not be empty".to_string());
    }
    if importpath.starts_with('/') || importpath.ends_with('/') {
        return Err(format!("importpath '{importpath}' must not start or end with '/'"));
    }
    if importpath.chars().any(char::is_whitespace) {
        return Err(format!("importpath '{importpath}' must not contain whitespace"));
    }
    if importpath.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err(format!("importpath '{importpath}' has an empty or relative element"));
    }
    Ok(())
}

/// Pick the single populated pin mode and validate it.
fn select_pin(spec: &DeclarationSpec, name: &str, importpath: &str) -> Result<Pin, RepoError> {
    let ambiguous = |reason: String| RepoError::AmbiguousDeclaration {
        name: name.to_string(),
        importpath: importpath.to_string(),
        reason,
    };
    let invalid = |reason: String| RepoError::InvalidDeclaration {
        name: name.to_string(),
        reason,
    };

    let module = spec.version.is_some() || spec.sum.is_some();
    let vcs = spec.commit.is_some()
        || spec.remote.is_some()
        || spec.vcs.is_some()
        || spec.replace.is_some();
    let archive = !spec.urls.is_empty() || spec.sha256.is_some() || spec.strip_prefix.is_some();

    let populated: Vec<&str> = [(module, "version/sum"), (vcs, "commit"), (archive, "urls/sha256")]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, label)| *label)
        .collect();

    match populated.len() {
        0 => {
            return Err(ambiguous(
                "no pin given; declare version + sum, commit, or urls + sha256".to_string(),
            ));
        }
        1 => {}
        _ => {
            return Err(ambiguous(format!(
                "more than one pin mode given ({}); declare exactly one",
                populated.join(", ")
            )));
        }
    }

    if module {
        let version = spec
            .version
            .clone()
            .ok_or_else(|| invalid("`sum` requires `version`".to_string()))?;
        let sum = spec
            .sum
            .clone()
            .ok_or_else(|| invalid("`version` requires `sum`".to_string()))?;
        validate_module_version(&version).map_err(&invalid)?;
        validate_sum(&sum).map_err(&invalid)?;
        return Ok(Pin::Module { version, sum });
    }

    if vcs {
        let commit = spec
            .commit
            .as_deref()
            .ok_or_else(|| invalid("VCS pins require `commit`".to_string()))?
            .to_ascii_lowercase();
        if commit.len() != 40 || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid(format!("commit '{commit}' is not a 40-character hex SHA")));
        }
        let kind = spec.vcs.clone().unwrap_or_else(|| "git".to_string());
        if kind != "git" {
            return Err(invalid(format!("unsupported vcs '{kind}' (only git is supported)")));
        }
        let remote = spec.remote.clone().unwrap_or_else(|| format!("https://{importpath}"));
        return Ok(Pin::Vcs {
            commit,
            remote,
            vcs: kind,
            replace: spec.replace.clone(),
        });
    }

    if spec.urls.is_empty() {
        return Err(invalid("archive pins require at least one url".to_string()));
    }
    let sha256 = spec
        .sha256
        .as_deref()
        .ok_or_else(|| invalid("archive pins require `sha256`".to_string()))?
        .to_ascii_lowercase();
    if sha256.len() != 64 || !sha256.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(format!("sha256 '{sha256}' is not a 64-character hex digest")));
    }
    Ok(Pin::Archive {
        urls: spec.urls.clone(),
        sha256,
        strip_prefix: spec.strip_prefix.clone().filter(|p| !p.is_empty()),
    })
}

fn validate_module_version(version: &str) -> Result<(), String> {
    let bare = version
        .strip_prefix('v')
        .ok_or_else(|| format!("version '{version}' must start with 'v'"))?;
    semver::Version::parse(bare)
        .map(|_| ())
        .map_err(|e| format!("version '{version}' is not a semantic version: {e}"))
}

fn validate_sum(sum: &str) -> Result<(), String> {
    let encoded = sum
        .strip_prefix("h1:")
        .ok_or_else(|| format!("sum '{sum}' must use the h1: format"))?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| format!("sum '{sum}' is not valid base64: {e}"))?;
    if decoded.len() != 32 {
        return Err(format!("sum '{sum}' does not encode a SHA-256 digest"));
    }
    Ok(())
}

/// Resolve a patch reference. `//pkg:file` and `//:file` forms are accepted and
/// mapped onto the manifest directory.
fn resolve_patch_ref(base_dir: &Path, raw: &str) -> Result<PathBuf, String> {
    if raw.starts_with('@') {
        return Err(format!("patch '{raw}' refers to another repository; use a path"));
    }
    let rel = match raw.strip_prefix("//") {
        Some(label) => match label.split_once(':') {
            Some(("", file)) => PathBuf::from(file),
            Some((pkg, file)) => Path::new(pkg).join(file),
            None => PathBuf::from(label),
        },
        None => PathBuf::from(raw),
    };
    Ok(if rel.is_absolute() { rel } else { base_dir.join(rel) })
}
