//! Patch application.
//!
//! Patches are applied to a freshly fetched tree, in declaration order, by the
//! system `patch` tool. The invocation is forced non-interactive, rejects are
//! discarded, and no backup files are left behind:
//!
//! ```text
//! patch -f --no-backup-if-mismatch --reject-file=- {patch_args...} -i {patch}
//! ```
//!
//! The first patch that fails stops the sequence with
//! [`RepoError::PatchApplyFailure`]. Patching happens in staging, before the
//! cache marks the tree complete, so a complete tree is never patched twice.

use std::path::{Path, PathBuf};

use crate::constants::PATCH_TIMEOUT;
use crate::core::RepoError;
use crate::declaration::DependencyDeclaration;
use crate::tool::ToolCommand;

/// Flags always passed to `patch`, ahead of the declared `patch_args`.
pub const FIXED_PATCH_FLAGS: &[&str] = &["-f", "--no-backup-if-mismatch", "--reject-file=-"];

/// Apply every patch of `decl` to `tree`.
pub async fn apply(decl: &DependencyDeclaration, tree: &Path) -> Result<(), RepoError> {
    apply_patches(&decl.name, &decl.importpath, tree, &decl.patches, &decl.patch_args).await
}

/// Apply `patches` in order to `tree` with `patch_args`.
pub async fn apply_patches(
    name: &str,
    importpath: &str,
    tree: &Path,
    patches: &[PathBuf],
    patch_args: &[String],
) -> Result<(), RepoError> {
    let failure = |patch: &Path, reason: String| RepoError::PatchApplyFailure {
        name: name.to_string(),
        importpath: importpath.to_string(),
        patch: patch.display().to_string(),
        reason,
    };

    for patch in patches {
        let absolute = std::path::absolute(patch)
            .map_err(|e| failure(patch, format!("cannot resolve patch path: {e}")))?;
        if !absolute.is_file() {
            return Err(failure(patch, "patch file not found".to_string()));
        }

        tracing::debug!(target: "patch", "({}) Applying {}", name, patch.display());
        let result = ToolCommand::patch()
            .args(FIXED_PATCH_FLAGS.iter().copied())
            .args(patch_args.iter().cloned())
            .arg("-i")
            .arg(absolute.display().to_string())
            .current_dir(tree)
            .timeout(PATCH_TIMEOUT)
            .with_context(name)
            .execute()
            .await;

        match result {
            Ok(_) => {}
            Err(RepoError::ToolCommandError { stderr, .. }) => {
                return Err(failure(patch, stderr));
            }
            Err(other) => return Err(other),
        }
    }

    if !patches.is_empty() {
        tracing::info!(target: "patch", "({}) Applied {} patch(es)", name, patches.len());
    }
    Ok(())
}
