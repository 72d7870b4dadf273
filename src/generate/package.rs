//! Minimal Go source scanning: package clause, imports, build constraints and
//! directive comments.
//!
//! Only the file header is read. Go requires imports to precede every other
//! declaration, so scanning stops at the first line that is neither a comment, an
//! import, nor blank.

use regex::Regex;

use crate::directive::Directive;

/// What the generator needs to know about one `.go` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoFile {
    /// File name
    pub name: String,
    /// Declared package name
    pub package: String,
    /// Imported paths in source order
    pub imports: Vec<String>,
    /// `_test.go` file
    pub is_test: bool,
    /// Excluded by an `ignore` build constraint
    pub ignored: bool,
    /// `gazelle:` directives found in header comments
    pub directives: Vec<Directive>,
    /// Malformed directive comments: (line, reason)
    pub directive_errors: Vec<(String, String)>,
}

/// Header scanner for Go files.
pub struct GoScanner {
    package: Regex,
    import_spec: Regex,
    ignore_tag: Regex,
}

impl GoScanner {
    /// Compile the scanner's patterns.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            package: Regex::new(r"^package\s+([A-Za-z_][A-Za-z0-9_]*)")?,
            import_spec: Regex::new(r#"^(?:[A-Za-z_.][A-Za-z0-9_]*\s+)?"([^"]+)""#)?,
            ignore_tag: Regex::new(r"(?:^|[^!A-Za-z0-9_.])ignore(?:$|[^A-Za-z0-9_.])")?,
        })
    }

    /// Scan the header of file `name` with `content`.
    ///
    /// Returns `None` when no package clause is found.
    #[must_use]
    pub fn scan(&self, name: &str, content: &str) -> Option<GoFile> {
        let mut file = GoFile {
            name: name.to_string(),
            is_test: name.ends_with("_test.go"),
            ..GoFile::default()
        };

        let mut lines = content.lines();
        let mut in_block_comment = false;

        for raw in lines.by_ref() {
            let line = raw.trim();
            if in_block_comment {
                in_block_comment = !line.contains("*/");
                continue;
            }
            if line.is_empty() {
                continue;
            }
            if line.starts_with("/*") {
                in_block_comment = !line.contains("*/");
                continue;
            }
            if let Some(expr) = line.strip_prefix("//go:build") {
                file.ignored |= self.ignore_tag.is_match(expr.trim());
                continue;
            }
            if let Some(tags) = line.strip_prefix("// +build") {
                file.ignored |= tags.split_whitespace().any(|t| t == "ignore");
                continue;
            }
            if line.starts_with("//") {
                match Directive::parse_comment(line) {
                    Ok(Some(directive)) => file.directives.push(directive),
                    Ok(None) => {}
                    Err(reason) => file.directive_errors.push((line.to_string(), reason)),
                }
                continue;
            }
            let captures = self.package.captures(line)?;
            file.package = captures[1].to_string();
            break;
        }
        if file.package.is_empty() {
            return None;
        }

        let mut in_group = false;
        for raw in lines {
            let line = strip_line_comment(raw.trim());
            if in_block_comment {
                in_block_comment = !line.contains("*/");
                continue;
            }
            if line.is_empty() {
                continue;
            }
            if line.starts_with("/*") {
                in_block_comment = !line.contains("*/");
                continue;
            }
            if in_group {
                if line.starts_with(')') {
                    in_group = false;
                } else {
                    self.push_import(&mut file, line);
                }
                continue;
            }
            match line.strip_prefix("import") {
                Some(rest) if rest.starts_with(|c: char| c.is_whitespace() || c == '(') => {
                    let rest = rest.trim();
                    if let Some(group) = rest.strip_prefix('(') {
                        let group = group.trim();
                        if group.is_empty() {
                            in_group = true;
                        } else if let Some(single) = group.strip_suffix(')') {
                            for spec in single.split(';') {
                                self.push_import(&mut file, spec.trim());
                            }
                        } else {
                            self.push_import(&mut file, group);
                            in_group = true;
                        }
                    } else {
                        self.push_import(&mut file, rest);
                    }
                }
                _ => break,
            }
        }
        Some(file)
    }

    fn push_import(&self, file: &mut GoFile, spec: &str) {
        if let Some(captures) = self.import_spec.captures(spec) {
            file.imports.push(captures[1].to_string());
        }
    }
}

fn strip_line_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) if line[..idx].matches('"').count() % 2 == 0 => line[..idx].trim_end(),
        _ => line,
    }
}

/// Whether an import path belongs to the Go standard library.
///
/// Standard library paths have no dot in their first element; `C` is cgo.
#[must_use]
pub fn is_standard_import(importpath: &str) -> bool {
    let first = importpath.split('/').next().unwrap_or(importpath);
    !first.contains('.')
}
