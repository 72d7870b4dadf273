//! Build target labels.

use std::fmt;

/// A reference to a target: `//pkg:name` inside the current repository or
/// `@repo//pkg:name` in another one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    /// External repository name; `None` for the current repository
    pub repo: Option<String>,
    /// Package directory, `/`-separated, `""` for the root
    pub package: String,
    /// Target name
    pub name: String,
}

impl Label {
    /// Label in the current repository.
    pub fn local(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            repo: None,
            package: package.into(),
            name: name.into(),
        }
    }

    /// Label in repository `repo`.
    pub fn external(
        repo: impl Into<String>,
        package: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            repo: Some(repo.into()),
            package: package.into(),
            name: name.into(),
        }
    }

    /// Form used from inside `from_package` of the current repository.
    ///
    /// Targets in the same package are written `:name`.
    #[must_use]
    pub fn relative_to(&self, from_package: &str) -> String {
        if self.repo.is_none() && self.package == from_package {
            format!(":{}", self.name)
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(repo) = &self.repo {
            write!(f, "@{repo}")?;
        }
        write!(f, "//{}:{}", self.package, self.name)
    }
}
