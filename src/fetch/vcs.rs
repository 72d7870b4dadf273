//! Git checkouts at an exact commit.

use regex::Regex;
use std::path::Path;

use super::{mismatch, unavailable};
use crate::constants::{GIT_CLONE_TIMEOUT, GIT_LOCAL_TIMEOUT};
use crate::core::{FileOperation, FileOperationError, FileResultExt, RepoError};
use crate::declaration::DependencyDeclaration;
use crate::tool::ToolCommand;

/// Clone `remote`, check out `commit`, verify it, and strip VCS metadata.
///
/// When `replace` names an original import path different from the declared
/// one, the `module` line of `go.mod` is rewritten to the declared import path.
pub async fn fetch_commit(
    decl: &DependencyDeclaration,
    remote: &str,
    commit: &str,
    replace: Option<&str>,
    dest: &Path,
) -> Result<(), RepoError> {
    let dest_str = dest.display().to_string();

    ToolCommand::git()
        .args(["clone", "--quiet", "--no-checkout", remote, dest_str.as_str()])
        .timeout(GIT_CLONE_TIMEOUT)
        .with_context(&decl.name)
        .execute()
        .await
        .map_err(|e| vcs_error(decl, e))?;

    ToolCommand::git()
        .args(["checkout", "--quiet", "--detach", commit])
        .current_dir(dest)
        .timeout(GIT_LOCAL_TIMEOUT)
        .with_context(&decl.name)
        .execute()
        .await
        .map_err(|e| vcs_error(decl, e))?;

    let head = ToolCommand::git()
        .args(["rev-parse", "HEAD"])
        .current_dir(dest)
        .timeout(GIT_LOCAL_TIMEOUT)
        .with_context(&decl.name)
        .execute()
        .await
        .map_err(|e| vcs_error(decl, e))?
        .stdout
        .trim()
        .to_ascii_lowercase();
    if head != commit {
        return Err(mismatch(decl, commit, head));
    }

    let git_dir = dest.join(".git");
    tokio::fs::remove_dir_all(&git_dir).await.with_file_context(
        FileOperation::Remove,
        &git_dir,
        "stripping VCS metadata",
    )?;

    if let Some(original) = replace.filter(|r| *r != decl.importpath) {
        let rewritten = rewrite_module_path(dest, &decl.importpath).await?;
        tracing::debug!(
            target: "fetch",
            "({}) Fork of {}: go.mod {}",
            decl.name,
            original,
            if rewritten { "rewritten" } else { "absent" }
        );
    }

    Ok(())
}

/// Rewrite the `module` directive of `{dir}/go.mod` to `importpath`.
///
/// Returns `false` when there is no `go.mod` or it has no `module` line.
pub async fn rewrite_module_path(dir: &Path, importpath: &str) -> Result<bool, RepoError> {
    let go_mod = dir.join("go.mod");
    let content = match tokio::fs::read_to_string(&go_mod).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(FileOperationError {
                operation: FileOperation::Read,
                file_path: go_mod,
                purpose: "reading go.mod".to_string(),
                source,
            }
            .into());
        }
    };

    let module_line = Regex::new(r#"(?m)^([ \t]*module[ \t]+)("[^"]*"|\S+)(.*)$"#)
        .map_err(|e| RepoError::other(format!("Invalid module line pattern: {e}")))?;
    if !module_line.is_match(&content) {
        return Ok(false);
    }
    let updated = module_line.replacen(&content, 1, |caps: &regex::Captures<'_>| {
        format!("{}{}{}", &caps[1], importpath, &caps[3])
    });
    tokio::fs::write(&go_mod, updated.as_bytes()).await.with_file_context(
        FileOperation::Write,
        &go_mod,
        "rewriting module path",
    )?;
    Ok(true)
}

fn vcs_error(decl: &DependencyDeclaration, err: RepoError) -> RepoError {
    match err {
        RepoError::ToolCommandError { command, stderr } => {
            unavailable(decl, format!("{command}: {stderr}"))
        }
        other => other,
    }
}
