//! Scoped directive streams from the manifest.
//!
//! Lines before the first `repo <name>` directive are global. Each `repo`
//! directive opens a scope that collects the following lines until the next
//! `repo` directive or the end of the stream:
//!
//! ```text
//! gazelle:go_test none          <- global
//! gazelle:repo test             <- opens scope "test"
//! gazelle:exclude vendor        <- applies to "test" only
//! ```
//!
//! A malformed line does not abort parsing. It is recorded against its scope and
//! only resolving a repository that depends on that scope fails.

use serde::Serialize;
use std::collections::BTreeMap;

use super::{Directive, keys};
use crate::core::RepoError;
use crate::declaration::{DependencyDeclaration, NamingConvention};

/// Name under which global-scope errors are reported.
pub const GLOBAL_SCOPE: &str = "global";

#[derive(Debug, Clone, PartialEq, Eq)]
struct ScopeError {
    line: String,
    reason: String,
}

/// Parsed directive stream.
#[derive(Debug, Clone, Default)]
pub struct DirectiveStream {
    global: Vec<Directive>,
    global_errors: Vec<ScopeError>,
    scopes: BTreeMap<String, Vec<Directive>>,
    scope_errors: BTreeMap<String, Vec<ScopeError>>,
    repo_order: Vec<String>,
}

/// Directives resolved for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryDirectives {
    /// Naming convention after all overrides
    pub naming_convention: NamingConvention,
    /// Directives in merge order: global, `repo` scope, declaration
    pub directives: Vec<Directive>,
}

impl DirectiveStream {
    /// Parse an ordered list of directive lines.
    pub fn parse<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stream = Self::default();
        let mut current: Option<String> = None;

        for raw in lines {
            let line = raw.as_ref();
            match Directive::parse(line) {
                Ok(None) => {}
                Ok(Some(directive)) if directive.key == keys::REPO => {
                    let name = directive.value.clone().unwrap_or_default();
                    if !stream.repo_order.contains(&name) {
                        stream.repo_order.push(name.clone());
                    }
                    stream.scopes.entry(name.clone()).or_default();
                    current = Some(name);
                }
                Ok(Some(directive)) => match &current {
                    Some(scope) => stream.scopes.entry(scope.clone()).or_default().push(directive),
                    None => stream.global.push(directive),
                },
                Err(reason) => {
                    tracing::warn!(
                        target: "directive",
                        "Invalid directive '{}' in scope '{}': {}",
                        line.trim(),
                        current.as_deref().unwrap_or(GLOBAL_SCOPE),
                        reason
                    );
                    let error = ScopeError {
                        line: line.trim().to_string(),
                        reason,
                    };
                    match &current {
                        Some(scope) => {
                            stream.scope_errors.entry(scope.clone()).or_default().push(error);
                        }
                        None => stream.global_errors.push(error),
                    }
                }
            }
        }
        stream
    }

    /// Repository scope names in first-appearance order.
    #[must_use]
    pub fn repo_names(&self) -> &[String] {
        &self.repo_order
    }

    /// Global directives (excluding `repo` markers).
    #[must_use]
    pub fn global(&self) -> &[Directive] {
        &self.global
    }

    /// Directives of a `repo` scope, if it exists.
    #[must_use]
    pub fn scope(&self, name: &str) -> Option<&[Directive]> {
        self.scopes.get(name).map(Vec::as_slice)
    }

    /// First error recorded for `scope`, as a [`RepoError`] against repository `name`.
    #[must_use]
    pub fn error_for(&self, scope: &str, name: &str) -> Option<RepoError> {
        let errors = if scope == GLOBAL_SCOPE {
            Some(&self.global_errors)
        } else {
            self.scope_errors.get(scope)
        };
        errors.and_then(|e| e.first()).map(|e| RepoError::DirectiveParseError {
            name: name.to_string(),
            scope: scope.to_string(),
            line: e.line.clone(),
            reason: e.reason.clone(),
        })
    }

    /// Whether any scope recorded a parse error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.global_errors.is_empty() || !self.scope_errors.is_empty()
    }

    /// Resolve the directive set and naming convention for a declaration.
    ///
    /// Merge order, lowest priority first: global lines, the declaration's `repo`
    /// scope, its `build_directives`, then its `build_naming_convention`.
    /// Errors in the global scope, in the declaration's scope, or in its own
    /// `build_directives` make this fail; errors in other scopes do not.
    pub fn resolve(&self, decl: &DependencyDeclaration) -> Result<RepositoryDirectives, RepoError> {
        if let Some(err) = self.error_for(GLOBAL_SCOPE, &decl.name) {
            return Err(err);
        }
        if let Some(err) = self.error_for(&decl.name, &decl.name) {
            return Err(err);
        }

        let mut directives = self.global.clone();
        if let Some(scoped) = self.scopes.get(&decl.name) {
            directives.extend(scoped.iter().cloned());
        }
        for line in &decl.build_directives {
            match Directive::parse(line) {
                Ok(Some(directive)) if directive.key == keys::REPO => {}
                Ok(Some(directive)) => directives.push(directive),
                Ok(None) => {}
                Err(reason) => {
                    return Err(RepoError::DirectiveParseError {
                        name: decl.name.clone(),
                        scope: decl.name.clone(),
                        line: line.trim().to_string(),
                        reason,
                    });
                }
            }
        }

        let mut naming_convention = NamingConvention::EXTERNAL_DEFAULT;
        for directive in directives.iter().filter(|d| d.key == keys::GO_NAMING_CONVENTION) {
            if let Some(Ok(convention)) =
                directive.value.as_deref().map(str::parse::<NamingConvention>)
            {
                naming_convention = convention;
            }
        }
        if let Some(explicit) = decl.build_naming_convention {
            naming_convention = explicit;
        }

        // The root scope re-applies the directives; the attribute must win there too.
        if decl.build_naming_convention.is_some() {
            directives.push(Directive::new(
                keys::GO_NAMING_CONVENTION,
                Some(naming_convention.as_str()),
            ));
        }

        Ok(RepositoryDirectives {
            naming_convention,
            directives,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::DeclarationSpec;
    use std::path::Path;

    fn decl(name: &str, directives: &[&str], convention: Option<&str>) -> DependencyDeclaration {
        let spec = DeclarationSpec {
            name: Some(name.to_string()),
            importpath: "github.com/pkg/errors".to_string(),
            version: Some("v0.8.1".to_string()),
            sum: Some("h1:iURUrRGxPUNPdy5/HRSm+Yj6okJ6UtLINN0Q9M4+h3I=".to_string()),
            build_directives: directives.iter().map(|s| (*s).to_string()).collect(),
            build_naming_convention: convention.map(str::to_string),
            ..DeclarationSpec::default()
        };
        DependencyDeclaration::from_spec(&spec, Path::new("/")).unwrap()
    }

    #[test]
    fn test_lines_before_repo_are_global() {
        let stream = DirectiveStream::parse([
            "gazelle:go_test none",
            "gazelle:repo test",
            "gazelle:exclude vendor",
            "gazelle:repo other",
            "gazelle:exclude docs",
        ]);
        assert_eq!(stream.global(), &[Directive::new("go_test", Some("none"))]);
        assert_eq!(stream.scope("test").unwrap(), &[Directive::new("exclude", Some("vendor"))]);
        assert_eq!(stream.scope("other").unwrap(), &[Directive::new("exclude", Some("docs"))]);
        assert_eq!(stream.repo_names(), &["test".to_string(), "other".to_string()]);
    }

    #[test]
    fn test_resolve_merge_order() {
        let stream = DirectiveStream::parse([
            "gazelle:go_naming_convention import",
            "gazelle:repo errors_go_git",
            "gazelle:go_naming_convention go_default_library",
        ]);

        let scoped = stream.resolve(&decl("errors_go_git", &[], None)).unwrap();
        assert_eq!(scoped.naming_convention, NamingConvention::GoDefaultLibrary);

        let global_only = stream.resolve(&decl("errors_go_mod", &[], None)).unwrap();
        assert_eq!(global_only.naming_convention, NamingConvention::Import);

        let own = stream
            .resolve(&decl("errors_go_mod", &["gazelle:go_naming_convention import_alias"], None))
            .unwrap();
        assert_eq!(own.naming_convention, NamingConvention::ImportAlias);

        let attribute = stream
            .resolve(&decl(
                "errors_go_git",
                &["gazelle:go_naming_convention import"],
                Some("import_alias"),
            ))
            .unwrap();
        assert_eq!(attribute.naming_convention, NamingConvention::ImportAlias);
        assert_eq!(
            attribute.directives.last(),
            Some(&Directive::new("go_naming_convention", Some("import_alias")))
        );
    }

    #[test]
    fn test_default_convention_is_import_alias() {
        let stream = DirectiveStream::parse(Vec::<String>::new());
        let resolved = stream.resolve(&decl("errors_go_mod", &[], None)).unwrap();
        assert_eq!(resolved.naming_convention, NamingConvention::ImportAlias);
        assert!(resolved.directives.is_empty());
    }

    #[test]
    fn test_scope_error_is_isolated() {
        let stream = DirectiveStream::parse([
            "gazelle:repo broken",
            "gazelle:go_test maybe",
            "gazelle:repo fine",
            "gazelle:exclude x",
        ]);
        assert!(stream.has_errors());
        let err = stream.resolve(&decl("broken", &[], None)).unwrap_err();
        match err {
            RepoError::DirectiveParseError { scope, line, .. } => {
                assert_eq!(scope, "broken");
                assert_eq!(line, "gazelle:go_test maybe");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(stream.resolve(&decl("fine", &[], None)).is_ok());
        assert!(stream.resolve(&decl("unrelated", &[], None)).is_ok());
    }

    #[test]
    fn test_global_error_affects_everyone() {
        let stream = DirectiveStream::parse(["gazelle:exclude", "gazelle:repo test"]);
        assert!(matches!(
            stream.resolve(&decl("test", &[], None)),
            Err(RepoError::DirectiveParseError { .. })
        ));
    }

    #[test]
    fn test_directive_errors_name_the_repository() {
        let stream = DirectiveStream::parse(["gazelle:go_naming_convention bogus"]);
        let err = stream.resolve(&decl("errors_go_mod", &[], None)).unwrap_err();
        assert_eq!(err.repository(), Some("errors_go_mod"));
        assert!(err.to_string().contains("scope 'global' for 'errors_go_mod'"));
        let other = stream.resolve(&decl("com_github_apex_log", &[], None)).unwrap_err();
        assert_eq!(other.repository(), Some("com_github_apex_log"));

        let stream = DirectiveStream::parse(["gazelle:repo broken", "gazelle:go_test maybe"]);
        let err = stream.resolve(&decl("broken", &[], None)).unwrap_err();
        assert_eq!(err.repository(), Some("broken"));

        let stream = DirectiveStream::parse(Vec::<String>::new());
        let err = stream.resolve(&decl("own", &["gazelle:bad-key"], None)).unwrap_err();
        assert_eq!(err.repository(), Some("own"));
    }

    #[test]
    fn test_bad_build_directive_fails_that_repository() {
        let stream = DirectiveStream::parse(Vec::<String>::new());
        let err = stream.resolve(&decl("x", &["gazelle:bad-key"], None)).unwrap_err();
        assert!(matches!(err, RepoError::DirectiveParseError { scope, .. } if scope == "x"));
    }
}
