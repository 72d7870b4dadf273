//! Build metadata generation for materialized repositories.
//!
//! [`generate`] walks a source tree depth-first in lexicographic order and turns
//! every Go package directory into [`GeneratedTarget`] records. The records are
//! plain data; rendering them into a build language is left to the caller.
//!
//! # Directive scoping
//!
//! Each directory is visited with an explicit [`DirectiveScope`] derived from its
//! parent's. The parent decides whether a child is excluded, so an excluded
//! directory is never listed or read. Directives found in a directory (comments in
//! an existing build file, `// gazelle:` header comments in its `.go` files) only
//! apply to that directory and its descendants.
//!
//! # Dependency edges
//!
//! Imports are resolved in this order:
//! 1. standard library imports are dropped;
//! 2. packages generated from this tree become `//pkg:name` labels;
//! 3. other repositories in the [`ImportIndex`] become `@repo//pkg:name` labels;
//! 4. remaining paths under this repository's declared import path become local
//!    labels named with the repository's convention;
//! 5. anything else is reported in `unresolved_imports`.

pub mod label;
pub mod package;
pub mod resolve;

pub use label::Label;
pub use resolve::{ImportIndex, IndexEntry};

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::core::RepoError;
use crate::declaration::naming::last_element;
use crate::declaration::{BuildFileGeneration, DependencyDeclaration, NamingConvention};
use crate::directive::scope::join_rel;
use crate::directive::{Directive, DirectiveScope, GoTestMode, RepositoryDirectives};
use package::{GoFile, GoScanner, is_standard_import};
use resolve::visibility_for;

/// Kind of a generated target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Importable package
    Library,
    /// `package main` executable
    Binary,
    /// Package tests
    Test,
}

/// One build target synthesized from a package directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedTarget {
    /// Target kind
    pub kind: TargetKind,
    /// Target name
    pub name: String,
    /// Package directory relative to the repository root (`""` for the root)
    pub package: String,
    /// Import path of the package
    pub importpath: String,
    /// Visibility labels
    pub visibility: Vec<String>,
    /// Source file names
    pub srcs: Vec<String>,
    /// Dependency labels, sorted
    pub deps: Vec<String>,
    /// Targets whose sources are compiled into this one
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embed: Vec<String>,
    /// Additional names for this target
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Imports no known repository provides
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved_imports: Vec<String>,
}

impl GeneratedTarget {
    /// Label of this target within its repository.
    #[must_use]
    pub fn label(&self) -> Label {
        Label::local(self.package.clone(), self.name.clone())
    }
}

/// Everything [`generate`] needs besides the tree.
#[derive(Debug, Clone)]
pub struct GenerateContext {
    /// Repository name
    pub name: String,
    /// Declared import path; used for self-resolution even for forks
    pub importpath: String,
    /// Resolved repository directives
    pub directives: RepositoryDirectives,
    /// Generation mode
    pub build_file_generation: BuildFileGeneration,
    /// Build file names recognized at the root
    pub build_file_names: Vec<String>,
    /// Cross-repository lookup table
    pub index: Arc<ImportIndex>,
}

impl GenerateContext {
    /// Context for `decl` with its resolved directives.
    #[must_use]
    pub fn new(
        decl: &DependencyDeclaration,
        directives: RepositoryDirectives,
        index: Arc<ImportIndex>,
    ) -> Self {
        Self {
            name: decl.name.clone(),
            importpath: decl.importpath.clone(),
            directives,
            build_file_generation: decl.build_file_generation,
            build_file_names: decl.build_file_names.clone(),
            index,
        }
    }
}

/// A visited directory with buildable sources.
struct PackageDir {
    scope: DirectiveScope,
    files: Vec<GoFile>,
}

/// Generate targets for the tree at `tree`.
///
/// Blocking; async callers use `spawn_blocking`.
pub fn generate(tree: &Path, ctx: &GenerateContext) -> Result<Vec<GeneratedTarget>, RepoError> {
    let root = DirectiveScope::root(
        &ctx.importpath,
        ctx.directives.naming_convention,
        ctx.build_file_names.clone(),
        &ctx.directives.directives,
    );

    match ctx.build_file_generation {
        BuildFileGeneration::Off => {
            tracing::debug!(target: "generate", "{}: build file generation is off", ctx.name);
            return Ok(Vec::new());
        }
        BuildFileGeneration::Auto if find_build_file(tree, &root.build_file_names).is_some() => {
            tracing::debug!(
                target: "generate",
                "{}: repository ships its own build files; skipping generation",
                ctx.name
            );
            return Ok(Vec::new());
        }
        _ => {}
    }

    let scanner = GoScanner::new().map_err(|e| generate_error(ctx, e.to_string()))?;
    let walker = Walker {
        ctx,
        scanner,
    };
    let mut packages = Vec::new();
    walker.visit(tree, &root, &mut packages)?;

    let local = local_libraries(&packages);
    let root_convention = root.naming_convention;
    let mut targets = Vec::new();
    for package in &packages {
        targets.extend(package_targets(ctx, package, &local, root_convention));
    }

    tracing::debug!(
        target: "generate",
        "{}: {} targets from {} packages",
        ctx.name,
        targets.len(),
        packages.len()
    );
    Ok(targets)
}

/// Targets in package `package` or below it.
#[must_use]
pub fn targets_under<'a>(targets: &'a [GeneratedTarget], package: &str) -> Vec<&'a GeneratedTarget> {
    let package = package.trim_matches('/');
    targets
        .iter()
        .filter(|t| {
            package.is_empty()
                || t.package == package
                || t.package.strip_prefix(package).is_some_and(|rest| rest.starts_with('/'))
        })
        .collect()
}

struct Walker<'a> {
    ctx: &'a GenerateContext,
    scanner: GoScanner,
}

impl Walker<'_> {
    fn visit(
        &self,
        dir: &Path,
        parent: &DirectiveScope,
        out: &mut Vec<PackageDir>,
    ) -> Result<(), RepoError> {
        let rel = parent.rel.clone();
        let mut go_files: Vec<(String, String)> = Vec::new();
        let mut subdirs: Vec<String> = Vec::new();
        let mut local: Vec<Directive> = Vec::new();

        if let Some(build_file) = find_build_file(dir, &parent.build_file_names) {
            let content = std::fs::read_to_string(&build_file)
                .map_err(|e| generate_error(self.ctx, format!("{}: {e}", build_file.display())))?;
            for line in content.lines() {
                match Directive::parse_comment(line) {
                    Ok(Some(directive)) => local.push(directive),
                    Ok(None) => {}
                    Err(reason) => return Err(self.directive_error(&rel, line, reason)),
                }
            }
        }

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| generate_error(self.ctx, e.to_string()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().is_dir() {
                subdirs.push(name);
                continue;
            }
            if !name.ends_with(".go") || name.starts_with(['.', '_']) {
                continue;
            }
            if parent.is_excluded(&join_rel(&rel, &name)) {
                continue;
            }
            let bytes = std::fs::read(entry.path())
                .map_err(|e| generate_error(self.ctx, format!("{}: {e}", entry.path().display())))?;
            go_files.push((name, String::from_utf8_lossy(&bytes).into_owned()));
        }

        let mut files = Vec::new();
        for (name, content) in &go_files {
            let Some(file) = self.scanner.scan(name, content) else {
                tracing::debug!(target: "generate", "{}: no package clause in {}", self.ctx.name, join_rel(&rel, name));
                continue;
            };
            local.extend(file.directives.iter().cloned());
            files.push(file);
        }

        let scope = parent.child(&rel, &local);
        // A malformed header only matters in a file this directory still builds.
        for file in &files {
            if let Some((line, reason)) = file.directive_errors.first() {
                if !scope.is_excluded(&join_rel(&rel, &file.name)) {
                    return Err(self.directive_error(&rel, line, reason.clone()));
                }
            }
        }
        files.retain(|f| !f.ignored && !scope.is_excluded(&join_rel(&rel, &f.name)));

        if scope.ignore {
            tracing::debug!(target: "generate", "{}: ignoring sources in '{}'", self.ctx.name, rel);
        } else if !files.is_empty() {
            out.push(PackageDir {
                scope: scope.clone(),
                files,
            });
        }

        for name in subdirs {
            if name.starts_with(['.', '_']) || name == "testdata" {
                continue;
            }
            let child_rel = join_rel(&rel, &name);
            if scope.is_excluded(&child_rel) {
                tracing::debug!(target: "generate", "{}: excluded '{}'", self.ctx.name, child_rel);
                continue;
            }
            let child = DirectiveScope {
                rel: child_rel,
                ..scope.clone()
            };
            self.visit(&dir.join(&name), &child, out)?;
        }
        Ok(())
    }

    fn directive_error(&self, rel: &str, line: &str, reason: String) -> RepoError {
        RepoError::DirectiveParseError {
            name: self.ctx.name.clone(),
            scope: format!("@{}//{}", self.ctx.name, rel),
            line: line.trim().to_string(),
            reason,
        }
    }
}

fn find_build_file(dir: &Path, names: &[String]) -> Option<std::path::PathBuf> {
    names.iter().map(|n| dir.join(n)).find(|p| p.is_file())
}

fn generate_error(ctx: &GenerateContext, reason: String) -> RepoError {
    RepoError::GenerateError {
        name: ctx.name.clone(),
        reason,
    }
}

/// Package name of a directory: the most common non-test package name, ties
/// broken by the directory name and then lexicographically.
fn package_name(files: &[&GoFile], dir_name: &str) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for file in files {
        *counts.entry(file.package.as_str()).or_default() += 1;
    }
    let max = counts.values().copied().max()?;
    let mut candidates = counts.into_iter().filter(|(_, c)| *c == max).map(|(p, _)| p);
    let first = candidates.next()?;
    if first == dir_name {
        return Some(first.to_string());
    }
    Some(candidates.find(|p| *p == dir_name).unwrap_or(first).to_string())
}

/// Library labels of importable packages generated from this tree.
fn local_libraries(packages: &[PackageDir]) -> BTreeMap<String, Label> {
    let mut libraries = BTreeMap::new();
    for package in packages {
        let non_test: Vec<&GoFile> = package.files.iter().filter(|f| !f.is_test).collect();
        let dir_name = last_element(&package.scope.rel);
        match package_name(&non_test, dir_name) {
            Some(name) if name != "main" => {
                let importpath = package.scope.importpath();
                let target = package.scope.naming_convention.library_name(&importpath, false);
                libraries.insert(importpath, Label::local(package.scope.rel.clone(), target));
            }
            _ => {}
        }
    }
    libraries
}

struct Resolved {
    deps: Vec<String>,
    unresolved: Vec<String>,
}

fn resolve_imports<'a>(
    ctx: &GenerateContext,
    imports: impl IntoIterator<Item = &'a String>,
    from_package: &str,
    skip: Option<&str>,
    local: &BTreeMap<String, Label>,
    root_convention: NamingConvention,
) -> Resolved {
    let own = ctx.importpath.as_str();
    let mut deps = BTreeSet::new();
    let mut unresolved = BTreeSet::new();

    for import in imports {
        let import = import.as_str();
        if Some(import) == skip || is_standard_import(import) {
            continue;
        }
        if let Some(label) = local.get(import) {
            deps.insert(label.relative_to(from_package));
            continue;
        }
        let under_self = import == own
            || import.strip_prefix(own).is_some_and(|rest| rest.starts_with('/'));
        let external = ctx.index.lookup(import).filter(|entry| {
            entry.name != ctx.name && (!under_self || entry.importpath.len() > own.len())
        });
        if external.is_some() {
            if let Some(label) = ctx.index.resolve(import) {
                deps.insert(label.to_string());
            }
        } else if under_self {
            let rel = import.strip_prefix(own).unwrap_or_default().trim_start_matches('/');
            let label = Label::local(rel, root_convention.library_name(import, false));
            deps.insert(label.relative_to(from_package));
        } else {
            unresolved.insert(import.to_string());
        }
    }

    Resolved {
        deps: deps.into_iter().collect(),
        unresolved: unresolved.into_iter().collect(),
    }
}

fn package_targets(
    ctx: &GenerateContext,
    package: &PackageDir,
    local: &BTreeMap<String, Label>,
    root_convention: NamingConvention,
) -> Vec<GeneratedTarget> {
    let scope = &package.scope;
    let rel = scope.rel.as_str();
    let importpath = scope.importpath();
    let convention = scope.naming_convention;

    let non_test: Vec<&GoFile> = package.files.iter().filter(|f| !f.is_test).collect();
    let tests: Vec<&GoFile> = package.files.iter().filter(|f| f.is_test).collect();
    let package_name = package_name(&non_test, last_element(rel));
    let lib_files: Vec<&GoFile> = non_test
        .iter()
        .copied()
        .filter(|f| Some(&f.package) == package_name.as_ref())
        .collect();
    for dropped in non_test.iter().filter(|f| Some(&f.package) != package_name.as_ref()) {
        tracing::warn!(
            target: "generate",
            "{}: skipping {} (package {} does not match {})",
            ctx.name,
            join_rel(rel, &dropped.name),
            dropped.package,
            package_name.as_deref().unwrap_or("?")
        );
    }

    let mut targets = Vec::new();
    let mut library_name = None;

    if let Some(pkg) = package_name.as_deref().filter(|_| !lib_files.is_empty()) {
        let is_command = pkg == "main";
        let name = convention.library_name(&importpath, is_command);
        let resolved = resolve_imports(
            ctx,
            lib_files.iter().flat_map(|f| f.imports.iter()),
            rel,
            None,
            local,
            root_convention,
        );
        targets.push(GeneratedTarget {
            kind: TargetKind::Library,
            name: name.clone(),
            package: rel.to_string(),
            importpath: importpath.clone(),
            visibility: vec![if is_command {
                "//visibility:private".to_string()
            } else {
                visibility_for(rel)
            }],
            srcs: lib_files.iter().map(|f| f.name.clone()).collect(),
            deps: resolved.deps,
            embed: Vec::new(),
            aliases: if is_command { Vec::new() } else { convention.library_aliases(&name) },
            unresolved_imports: resolved.unresolved,
        });

        if is_command {
            targets.push(GeneratedTarget {
                kind: TargetKind::Binary,
                name: last_element(&importpath).to_string(),
                package: rel.to_string(),
                importpath: importpath.clone(),
                visibility: vec!["//visibility:public".to_string()],
                srcs: Vec::new(),
                deps: Vec::new(),
                embed: vec![format!(":{name}")],
                aliases: Vec::new(),
                unresolved_imports: Vec::new(),
            });
        }
        library_name = Some(name);
    }

    if scope.go_test == GoTestMode::Package && !tests.is_empty() {
        let internal = tests.iter().any(|f| Some(&f.package) == package_name.as_ref());
        let embed: Vec<String> = match (&library_name, internal) {
            (Some(lib), true) => vec![format!(":{lib}")],
            _ => Vec::new(),
        };
        let skip = (!embed.is_empty()).then_some(importpath.as_str());
        let resolved = resolve_imports(
            ctx,
            tests.iter().flat_map(|f| f.imports.iter()),
            rel,
            skip,
            local,
            root_convention,
        );
        targets.push(GeneratedTarget {
            kind: TargetKind::Test,
            name: convention.test_name(&importpath),
            package: rel.to_string(),
            importpath,
            visibility: Vec::new(),
            srcs: tests.iter().map(|f| f.name.clone()).collect(),
            deps: resolved.deps,
            embed,
            aliases: Vec::new(),
            unresolved_imports: resolved.unresolved,
        });
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::DeclarationSpec;
    use crate::directive::DirectiveStream;
    use std::fs;
    use tempfile::TempDir;

    const SUM: &str = "h1:iURUrRGxPUNPdy5/HRSm+Yj6okJ6UtLINN0Q9M4+h3I=";

    fn decl(name: &str, importpath: &str, extra: impl FnOnce(&mut DeclarationSpec)) -> DependencyDeclaration {
        let mut spec = DeclarationSpec {
            name: Some(name.to_string()),
            importpath: importpath.to_string(),
            version: Some("v1.0.0".to_string()),
            sum: Some(SUM.to_string()),
            ..DeclarationSpec::default()
        };
        extra(&mut spec);
        DependencyDeclaration::from_spec(&spec, Path::new("/")).unwrap()
    }

    fn context(
        decl: &DependencyDeclaration,
        lines: &[&str],
        others: &[DependencyDeclaration],
    ) -> GenerateContext {
        let stream = DirectiveStream::parse(lines.iter().copied());
        let mut all = vec![decl.clone()];
        all.extend(others.iter().cloned());
        let index = Arc::new(ImportIndex::from_declarations(&all, &stream));
        GenerateContext::new(decl, stream.resolve(decl).unwrap(), index)
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn apex_log_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "go.mod", "module github.com/apex/log\n");
        write(
            root,
            "logger.go",
            "package log\n\nimport (\n\t\"fmt\"\n\t\"github.com/pkg/errors\"\n)\n",
        );
        write(root, "logger_test.go", "package log\n\nimport \"testing\"\n");
        write(
            root,
            "handlers/text/text.go",
            "package text\n\nimport \"github.com/apex/log\"\n",
        );
        write(root, "handlers/json/json.go", "package json\n");
        write(root, "internal/util/util.go", "package util\n");
        write(
            root,
            "_examples/basic/main.go",
            "package main\n\nimport \"github.com/apex/log\"\n",
        );
        write(root, "testdata/bad.go", "not go at all\n");
        temp
    }

    #[test]
    fn test_generates_packages_in_order() {
        let tree = apex_log_tree();
        let log = decl("com_github_apex_log", "github.com/apex/log", |_| {});
        let errors = decl("com_github_pkg_errors", "github.com/pkg/errors", |_| {});
        let ctx = context(&log, &[], &[errors]);

        let targets = generate(tree.path(), &ctx).unwrap();
        let labels: Vec<String> = targets.iter().map(|t| t.label().to_string()).collect();
        assert_eq!(
            labels,
            vec!["//:log", "//handlers/json:json", "//handlers/text:text", "//internal/util:util"]
        );

        let root = &targets[0];
        assert_eq!(root.kind, TargetKind::Library);
        assert_eq!(root.importpath, "github.com/apex/log");
        assert_eq!(root.srcs, vec!["logger.go"]);
        assert_eq!(root.deps, vec!["@com_github_pkg_errors//:errors"]);
        assert_eq!(root.aliases, vec!["go_default_library"]);
        assert_eq!(targets[2].deps, vec!["//:log"]);
        assert_eq!(targets[3].visibility, vec!["//:__subpackages__"]);
    }

    #[test]
    fn test_exclude_directive_suppresses_subtree() {
        let tree = apex_log_tree();
        // Unreadable content in the excluded subtree must not matter.
        write(tree.path(), "handlers/broken/broken.go", "// gazelle:exclude\npackage broken\n");
        let log = decl("com_github_apex_log", "github.com/apex/log", |_| {});
        let ctx = context(&log, &["gazelle:repo com_github_apex_log", "gazelle:exclude handlers"], &[]);

        let targets = generate(tree.path(), &ctx).unwrap();
        assert!(targets_under(&targets, "handlers").is_empty());
        assert!(targets.iter().all(|t| !t.package.starts_with("handlers")));
        assert_eq!(targets_under(&targets, "").len(), 2);
        assert_eq!(targets[0].unresolved_imports, vec!["github.com/pkg/errors"]);
    }

    #[test]
    fn test_go_default_library_convention_and_tests() {
        let tree = apex_log_tree();
        let log = decl("log_git", "github.com/apex/log", |s| {
            s.build_naming_convention = Some("go_default_library".to_string());
            s.build_directives = vec!["gazelle:go_test package".to_string()];
        });
        let ctx = context(&log, &[], &[]);

        let targets = generate(tree.path(), &ctx).unwrap();
        assert_eq!(targets[0].name, "go_default_library");
        assert!(targets[0].aliases.is_empty());
        let test = &targets[1];
        assert_eq!(test.kind, TargetKind::Test);
        assert_eq!(test.name, "go_default_test");
        assert_eq!(test.embed, vec![":go_default_library"]);
        let text = targets.iter().find(|t| t.package == "handlers/text").unwrap();
        assert_eq!(text.deps, vec!["//:go_default_library"]);
    }

    #[test]
    fn test_local_directives_do_not_leak_to_siblings() {
        let tree = apex_log_tree();
        write(tree.path(), "handlers/BUILD.bazel", "# gazelle:exclude json\n");
        write(tree.path(), "json/json.go", "package json\n");
        let log = decl("com_github_apex_log", "github.com/apex/log", |s| {
            s.build_file_generation = Some("on".to_string());
        });
        let ctx = context(&log, &[], &[]);

        let targets = generate(tree.path(), &ctx).unwrap();
        let packages: Vec<&str> = targets.iter().map(|t| t.package.as_str()).collect();
        assert!(packages.contains(&"json"));
        assert!(packages.contains(&"handlers/text"));
        assert!(!packages.contains(&"handlers/json"));
    }

    #[test]
    fn test_build_file_generation_modes() {
        let tree = apex_log_tree();
        write(tree.path(), "BUILD.bazel", "# upstream build file\n");

        let auto = decl("com_github_apex_log", "github.com/apex/log", |_| {});
        assert!(generate(tree.path(), &context(&auto, &[], &[])).unwrap().is_empty());

        let on = decl("com_github_apex_log", "github.com/apex/log", |s| {
            s.build_file_generation = Some("on".to_string());
        });
        assert!(!generate(tree.path(), &context(&on, &[], &[])).unwrap().is_empty());

        let off = decl("com_github_apex_log", "github.com/apex/log", |s| {
            s.build_file_generation = Some("off".to_string());
        });
        let fresh = apex_log_tree();
        assert!(generate(fresh.path(), &context(&off, &[], &[])).unwrap().is_empty());
    }

    #[test]
    fn test_command_package_and_ignore() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "cmd/tool/main.go", "package main\n\nimport \"example.com/tool/lib\"\n");
        write(temp.path(), "lib/lib.go", "package lib\n");
        write(temp.path(), "lib/gen.go", "//go:build ignore\n\npackage main\n");
        write(temp.path(), "skip/BUILD", "# gazelle:ignore\n");
        write(temp.path(), "skip/skip.go", "package skip\n");
        write(temp.path(), "skip/inner/inner.go", "package inner\n");
        write(temp.path(), "docs/README.md", "nothing to build\n");

        let tool = decl("com_example_tool", "example.com/tool", |s| {
            s.build_naming_convention = Some("import".to_string());
        });
        let targets = generate(temp.path(), &context(&tool, &[], &[])).unwrap();
        let summary: Vec<(TargetKind, String)> =
            targets.iter().map(|t| (t.kind, t.label().to_string())).collect();
        assert_eq!(
            summary,
            vec![
                (TargetKind::Library, "//cmd/tool:tool_lib".to_string()),
                (TargetKind::Binary, "//cmd/tool:tool".to_string()),
                (TargetKind::Library, "//lib:lib".to_string()),
                (TargetKind::Library, "//skip/inner:inner".to_string()),
            ]
        );
        assert_eq!(targets[0].deps, vec!["//lib:lib"]);
        assert_eq!(targets[0].visibility, vec!["//visibility:private"]);
        assert_eq!(targets[1].embed, vec![":tool_lib"]);
        assert_eq!(targets[2].srcs, vec!["lib.go"]);
    }

    #[test]
    fn test_fork_resolves_with_declared_importpath() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "go.mod", "module github.com/fork/errors\n");
        write(temp.path(), "errors.go", "package errors\n");
        write(temp.path(), "sub/sub.go", "package sub\n\nimport \"github.com/pkg/errors\"\n");

        let fork = decl("errors_go_git", "github.com/pkg/errors", |s| {
            s.version = None;
            s.sum = None;
            s.commit = Some("816c9085562cd7ee03e7f8188a1cfd942858cded".to_string());
            s.replace = Some("github.com/fork/errors".to_string());
        });
        let targets = generate(temp.path(), &context(&fork, &[], &[])).unwrap();
        let sub = targets.iter().find(|t| t.package == "sub").unwrap();
        assert_eq!(sub.deps, vec!["//:errors"]);
        assert_eq!(targets[0].importpath, "github.com/pkg/errors");
    }

    #[test]
    fn test_malformed_local_directive_fails_repository() {
        let tree = apex_log_tree();
        write(tree.path(), "handlers/BUILD.bazel", "# gazelle:exclude\n");
        let log = decl("com_github_apex_log", "github.com/apex/log", |s| {
            s.build_file_generation = Some("on".to_string());
        });
        let err = generate(tree.path(), &context(&log, &[], &[])).unwrap_err();
        assert!(matches!(err, RepoError::DirectiveParseError { .. }));
        assert_eq!(err.repository(), Some("com_github_apex_log"));
    }

    #[test]
    fn test_malformed_header_in_excluded_file_is_ignored() {
        let tree = apex_log_tree();
        write(tree.path(), "BUILD.bazel", "# gazelle:exclude generated.go\n");
        write(tree.path(), "generated.go", "// gazelle:exclude\n\npackage log\n");
        let log = decl("com_github_apex_log", "github.com/apex/log", |s| {
            s.build_file_generation = Some("on".to_string());
        });
        let targets = generate(tree.path(), &context(&log, &[], &[])).unwrap();
        let root = targets.iter().find(|t| t.package.is_empty()).unwrap();
        assert!(!root.srcs.contains(&"generated.go".to_string()));

        write(tree.path(), "BUILD.bazel", "");
        assert!(generate(tree.path(), &context(&log, &[], &[])).is_err());
    }
}
