//! File system helpers used by the cache store and the snapshotter.
//!
//! All functions are synchronous; async callers run them through
//! `tokio::task::spawn_blocking`.

use anyhow::{Context, Result, bail};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Create a directory and all parents, failing if the path is a file.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.is_file() {
        bail!("Path exists but is not a directory: {}", path.display());
    }
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Atomically replace `path` with `content`.
///
/// Content goes to a temporary file in the same directory, is synced, then
/// renamed over the target, so readers see either the old or the new bytes.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_dir(&parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(&parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    temp.write_all(content)
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    temp.as_file().sync_all().context("Failed to sync file to disk")?;
    temp.persist(path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;
    Ok(())
}

/// Write `content` only when it differs from what is on disk.
///
/// Returns `true` when the file was written. An unchanged file keeps its
/// modification time.
pub fn write_if_changed(path: &Path, content: &[u8]) -> Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == content => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    }
    atomic_write(path, content)?;
    Ok(true)
}

/// Remove a directory tree; a missing directory is not an error.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            // Read-only trees (e.g. extracted with 0444 modes) must be unlocked first.
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                make_owner_writable(path)?;
                fs::remove_dir_all(path)
                    .with_context(|| format!("Failed to remove directory: {}", path.display()))
            } else {
                Err(e).with_context(|| format!("Failed to remove directory: {}", path.display()))
            }
        }
    }
}

/// Set the owner-write bit on every directory and file under `root`.
///
/// Symlinks are not followed.
pub fn make_owner_writable(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_symlink() {
            continue;
        }
        let path = entry.path();
        let metadata = entry
            .metadata()
            .with_context(|| format!("Failed to read metadata: {}", path.display()))?;
        let mut permissions = metadata.permissions();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = permissions.mode();
            if mode & 0o200 != 0 {
                continue;
            }
            permissions.set_mode(mode | 0o200);
        }
        #[cfg(not(unix))]
        {
            if !permissions.readonly() {
                continue;
            }
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
        }

        fs::set_permissions(path, permissions)
            .with_context(|| format!("Failed to update permissions: {}", path.display()))?;
    }
    Ok(())
}

/// Verify that `dir` accepts new files by creating and deleting one.
pub fn probe_writable(dir: &Path) -> Result<()> {
    let probe = tempfile::Builder::new()
        .prefix(".extrepo-probe")
        .tempfile_in(dir)
        .with_context(|| format!("Directory is not writable: {}", dir.display()))?;
    probe
        .close()
        .with_context(|| format!("Failed to remove probe file in {}", dir.display()))
}

/// Validate an archive member path and turn it into a relative path.
///
/// Absolute paths and `..` components are rejected.
pub fn sanitize_rel_path(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                bail!("Invalid archive path (absolute): {}", path.display())
            }
            Component::ParentDir => bail!("Invalid archive path (..): {}", path.display()),
            Component::CurDir => {}
            Component::Normal(part) => out.push(part),
        }
    }
    Ok(out)
}

/// Render a relative path with `/` separators regardless of platform.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
