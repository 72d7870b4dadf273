//! Repository config snapshots.
//!
//! A snapshot is a generated text file listing every declared repository by name,
//! import path and, when set explicitly, naming convention. Pins are deliberately
//! left out: a consumer that loads the snapshot only needs to know which names
//! exist and which import paths they provide.
//!
//! ```text
//! # Code generated by extrepo; DO NOT EDIT.
//! # gazelle:repo test
//!
//! go_repository(
//!     name = "com_github_apex_log",
//!     importpath = "github.com/apex/log",
//! )
//! ```
//!
//! [`render`] is a pure function of its inputs and produces byte-identical output
//! for the same declaration set regardless of input order. [`write_snapshot`]
//! leaves an existing file untouched when its content would not change.

use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::constants::SNAPSHOT_HEADER;
use crate::core::RepoError;
use crate::declaration::{DependencyDeclaration, NamingConvention};
use crate::directive::{Directive, keys};
use crate::utils::fs::write_if_changed;

/// Rule name of each entry block.
pub const RULE_NAME: &str = "go_repository";

/// One repository in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotEntry {
    /// Repository name
    pub name: String,
    /// Declared import path
    pub importpath: String,
    /// Explicit naming convention, if any
    pub build_naming_convention: Option<NamingConvention>,
}

impl From<&DependencyDeclaration> for SnapshotEntry {
    fn from(decl: &DependencyDeclaration) -> Self {
        Self {
            name: decl.name.clone(),
            importpath: decl.importpath.clone(),
            build_naming_convention: decl.build_naming_convention,
        }
    }
}

/// A parsed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Directives listed in the header
    pub directives: Vec<Directive>,
    /// Entries in file order
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Snapshot of a declaration set and the global `repo` directives in effect.
    #[must_use]
    pub fn from_declarations(decls: &[DependencyDeclaration], repo_scopes: &[String]) -> Self {
        let mut entries: Vec<SnapshotEntry> = decls.iter().map(SnapshotEntry::from).collect();
        entries.sort();
        Self {
            directives: repo_scopes.iter().map(|r| Directive::new(keys::REPO, Some(r.as_str()))).collect(),
            entries,
        }
    }

    /// Render to text. See [`render`].
    #[must_use]
    pub fn render(&self) -> String {
        let mut entries = self.entries.clone();
        entries.sort();

        let mut out = String::new();
        out.push_str(SNAPSHOT_HEADER);
        out.push('\n');
        for directive in &self.directives {
            let _ = writeln!(out, "# {directive}");
        }
        for entry in &entries {
            out.push('\n');
            let _ = writeln!(out, "{RULE_NAME}(");
            let _ = writeln!(out, "    name = \"{}\",", escape(&entry.name));
            let _ = writeln!(out, "    importpath = \"{}\",", escape(&entry.importpath));
            if let Some(convention) = entry.build_naming_convention {
                let _ = writeln!(out, "    build_naming_convention = \"{convention}\",");
            }
            out.push_str(")\n");
        }
        out
    }
}

/// Render the snapshot for `decls` with the given `repo` scope names.
#[must_use]
pub fn render(decls: &[DependencyDeclaration], repo_scopes: &[String]) -> String {
    Snapshot::from_declarations(decls, repo_scopes).render()
}

/// Parse snapshot text.
pub fn parse(text: &str) -> Result<Snapshot, RepoError> {
    let mut snapshot = Snapshot::default();
    let mut names = BTreeSet::new();
    let mut block: Option<(usize, PartialEntry)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        let error = |reason: String| RepoError::SnapshotParseError {
            line: line_no,
            reason,
        };

        if block.is_none() {
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                match Directive::parse_comment(line) {
                    Ok(Some(directive)) => snapshot.directives.push(directive),
                    Ok(None) => {}
                    Err(reason) => return Err(error(reason)),
                }
                continue;
            }
            match line.strip_prefix(RULE_NAME).map(str::trim) {
                Some("(") => block = Some((line_no, PartialEntry::default())),
                _ => return Err(error(format!("expected '{RULE_NAME}(' but found '{line}'"))),
            }
            continue;
        }

        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == ")" {
            if let Some((start, partial)) = block.take() {
                let entry = partial.finish().map_err(|reason| RepoError::SnapshotParseError {
                    line: start,
                    reason,
                })?;
                if !names.insert(entry.name.clone()) {
                    return Err(error(format!("repository '{}' listed twice", entry.name)));
                }
                snapshot.entries.push(entry);
            }
            continue;
        }

        let (key, value) = parse_attribute(line).map_err(&error)?;
        if let Some((_, partial)) = block.as_mut() {
            partial.set(key, value).map_err(&error)?;
        }
    }

    if let Some((start, _)) = block {
        return Err(RepoError::SnapshotParseError {
            line: start,
            reason: format!("unterminated {RULE_NAME} block"),
        });
    }
    Ok(snapshot)
}

/// Write `text` to `path` unless the file already holds exactly that text.
///
/// Returns whether the file was written.
pub fn write_snapshot(path: &Path, text: &str) -> Result<bool> {
    let written = write_if_changed(path, text.as_bytes())?;
    if written {
        tracing::info!(target: "snapshot", "Wrote {}", path.display());
    } else {
        tracing::debug!(target: "snapshot", "{} is up to date", path.display());
    }
    Ok(written)
}

#[derive(Default)]
struct PartialEntry {
    name: Option<String>,
    importpath: Option<String>,
    build_naming_convention: Option<NamingConvention>,
}

impl PartialEntry {
    fn set(&mut self, key: &str, value: String) -> Result<(), String> {
        let slot = match key {
            "name" => &mut self.name,
            "importpath" => &mut self.importpath,
            "build_naming_convention" => {
                if self.build_naming_convention.is_some() {
                    return Err(format!("attribute '{key}' set twice"));
                }
                self.build_naming_convention = Some(value.parse()?);
                return Ok(());
            }
            other => return Err(format!("unknown attribute '{other}'")),
        };
        if slot.is_some() {
            return Err(format!("attribute '{key}' set twice"));
        }
        *slot = Some(value);
        Ok(())
    }

    fn finish(self) -> Result<SnapshotEntry, String> {
        Ok(SnapshotEntry {
            name: self.name.ok_or("missing 'name'")?,
            importpath: self.importpath.ok_or("missing 'importpath'")?,
            build_naming_convention: self.build_naming_convention,
        })
    }
}

fn parse_attribute(line: &str) -> Result<(&str, String), String> {
    let (key, rest) = line
        .split_once('=')
        .ok_or_else(|| format!("expected 'key = \"value\",' but found '{line}'"))?;
    let key = key.trim();
    let rest = rest.trim();
    let rest = rest.strip_suffix(',').unwrap_or(rest).trim_end();
    let quoted = rest
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .ok_or_else(|| format!("value of '{key}' must be a quoted string"))?;
    Ok((key, unescape(quoted)?))
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape(value: &str) -> Result<String, String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('\\' | '"')) => out.push(escaped),
                _ => return Err(format!("invalid escape in \"{value}\"")),
            },
            '"' => return Err(format!("unescaped quote in \"{value}\"")),
            other => out.push(other),
        }
    }
    Ok(out)
}
