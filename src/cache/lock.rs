//! Cross-process file locks for cache slots.
//!
//! Two processes materializing the same identity must not build the same slot at
//! once. Each slot has a lock file under `{cache}/.locks/`; holding an exclusive
//! `fs4` lock on it serializes creation across processes. In-process callers are
//! already serialized by the cache's state map before they get here.
//!
//! ```rust,no_run
//! use extrepo::cache::CacheLock;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let _lock = CacheLock::acquire(Path::new("/tmp/cache"), "3f2a9c").await?;
//! // slot work happens here; the lock is released on drop
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Directory holding lock files, relative to the cache root.
pub const LOCKS_DIR: &str = ".locks";

/// An exclusive lock on one cache slot, released on drop.
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Block (off the async runtime) until the lock named `name` is held.
    pub async fn acquire(cache_dir: &Path, name: &str) -> Result<Self> {
        let locks_dir = cache_dir.join(LOCKS_DIR);
        tokio::fs::create_dir_all(&locks_dir).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => anyhow::anyhow!(
                "Permission denied: cannot create locks directory at {}",
                locks_dir.display()
            ),
            _ => anyhow::anyhow!("Failed to create directory {}: {}", locks_dir.display(), e),
        })?;

        let lock_path = locks_dir.join(format!("{name}.lock"));
        let open_path = lock_path.clone();
        let lock_name = name.to_string();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&open_path)
                .with_context(|| format!("Failed to open lock file: {}", open_path.display()))?;
            file.lock_exclusive()
                .with_context(|| format!("Failed to acquire cache lock: {lock_name}"))?;
            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        tracing::trace!(target: "cache", "Acquired lock {}", lock_path.display());
        Ok(Self {
            file,
            path: lock_path,
        })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = self.file.unlock() {
            tracing::warn!(target: "cache", "Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
