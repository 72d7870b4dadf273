//! Content-addressed store of materialized repositories.
//!
//! Every pinned, patched dependency lives in one slot keyed by its
//! [`DependencyIdentity`]. A changed pin or patch set is a different identity and
//! therefore a different slot; existing slots are never rewritten.
//!
//! # Layout
//!
//! ```text
//! {cache}/
//! ├── repos/
//! │   ├── {identity}/            # materialized tree
//! │   └── {identity}.complete    # completion record, written last
//! ├── staging/                   # in-progress fetches (temporary directories)
//! └── .locks/
//!     └── {identity}.lock        # cross-process slot lock
//! ```
//!
//! A slot is valid only when its completion record exists and names the same
//! identity. The record is written after fetching, verification and patching have
//! all succeeded and the tree has been moved into place, so an interrupted run leaves
//! either a staging directory or a slot without a record. Both are discarded and
//! rebuilt the next time the identity is requested.
//!
//! # Concurrency
//!
//! Callers in one process coordinate through a `DashMap` of slot states. The first
//! caller for an identity inserts `Pending(notify)` and does the work; later callers
//! wait on the `Notify` and then observe the `Ready` state. Across processes a
//! [`CacheLock`] on the slot serializes creation, and the completion record is
//! re-checked after the lock is taken. Different identities never share a lock.
//!
//! # Writability
//!
//! Fetched trees can carry read-only modes (module zips, archives). The build
//! system stages files inside materialized repositories, so the owner-write bit is
//! set on everything before the slot is published.

pub mod lock;

pub use lock::CacheLock;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::constants::PENDING_STATE_TIMEOUT;
use crate::core::{FileOperation, FileResultExt, RepoError};
use crate::declaration::DependencyIdentity;
use crate::utils::fs as fs_utils;

/// Directory of materialized slots, relative to the cache root.
pub const REPOS_DIR: &str = "repos";
/// Directory of in-progress fetches, relative to the cache root.
pub const STAGING_DIR: &str = "staging";
/// Extension of slot completion records.
pub const COMPLETE_EXTENSION: &str = "complete";

#[derive(Debug, Clone)]
enum SlotState {
    /// A task in this process is creating the slot.
    Pending(Arc<tokio::sync::Notify>),
    /// The slot is complete at this path.
    Ready(PathBuf),
}

fn extract_notify_handle(
    slots: &DashMap<String, SlotState>,
    key: &str,
) -> Option<Arc<tokio::sync::Notify>> {
    slots.get(key).and_then(|entry| match entry.value() {
        SlotState::Pending(n) => Some(n.clone()),
        SlotState::Ready(_) => None,
    })
}

/// Completion record stored next to a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// Identity of the slot
    pub identity: DependencyIdentity,
    /// Repository name that created the slot
    pub name: String,
    /// Declared import path
    pub importpath: String,
    /// When the slot was published
    pub completed_at: DateTime<Utc>,
}

/// Result of [`Cache::get_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Path of the materialized tree
    pub path: PathBuf,
    /// Whether this call ran the creation step
    pub created: bool,
}

/// The shared module cache.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    slots: Arc<DashMap<String, SlotState>>,
}

impl Cache {
    /// Cache rooted at `dir`. Nothing is created until first use.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Cache root.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the slot for `identity`, whether or not it exists.
    #[must_use]
    pub fn slot_path(&self, identity: &DependencyIdentity) -> PathBuf {
        self.dir.join(REPOS_DIR).join(identity.as_str())
    }

    fn record_path(&self, identity: &DependencyIdentity) -> PathBuf {
        self.dir.join(REPOS_DIR).join(format!("{}.{COMPLETE_EXTENSION}", identity.as_str()))
    }

    /// Completion record of `identity`, if the slot is complete.
    #[must_use]
    pub fn completion_record(&self, identity: &DependencyIdentity) -> Option<CompletionRecord> {
        if !self.slot_path(identity).is_dir() {
            return None;
        }
        let bytes = std::fs::read(self.record_path(identity)).ok()?;
        let record: CompletionRecord = serde_json::from_slice(&bytes).ok()?;
        (record.identity == *identity).then_some(record)
    }

    /// Whether `identity` is materialized and complete.
    #[must_use]
    pub fn exists(&self, identity: &DependencyIdentity) -> bool {
        self.completion_record(identity).is_some()
    }

    /// Return the slot for `identity`, creating it with `create` when needed.
    ///
    /// `create` receives an empty staging directory and must leave the finished tree
    /// in it. The tree is made owner-writable, moved into the slot, and the completion
    /// record is written last. `create` is not called when the slot is already
    /// complete, so an identity is fetched and patched at most once.
    ///
    /// On failure the staging directory is discarded and nothing is published.
    pub async fn get_or_create<F, Fut>(
        &self,
        identity: &DependencyIdentity,
        name: &str,
        importpath: &str,
        create: F,
    ) -> Result<CacheEntry, RepoError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<(), RepoError>>,
    {
        let key = identity.as_str().to_string();
        let notify = Arc::new(tokio::sync::Notify::new());

        loop {
            match self.slots.entry(key.clone()) {
                dashmap::mapref::entry::Entry::Occupied(entry) => match entry.get() {
                    SlotState::Ready(path) if self.exists(identity) => {
                        let path = path.clone();
                        drop(entry);
                        tracing::debug!(
                            target: "cache",
                            "Reusing {} for {} ({})",
                            identity.short(),
                            name,
                            importpath
                        );
                        return Ok(CacheEntry {
                            path,
                            created: false,
                        });
                    }
                    SlotState::Ready(_) => {
                        // Removed or damaged behind our back.
                        drop(entry);
                        self.slots.insert(key.clone(), SlotState::Pending(notify.clone()));
                        break;
                    }
                    SlotState::Pending(existing) => {
                        let existing = existing.clone();
                        // The notified future must exist before the entry is released.
                        let notified = existing.notified();
                        drop(entry);

                        tracing::debug!(
                            target: "cache",
                            "Waiting for {} to be materialized by another task",
                            identity.short()
                        );
                        tokio::select! {
                            () = notified => continue,
                            () = tokio::time::sleep(PENDING_STATE_TIMEOUT) => {
                                tracing::warn!(
                                    target: "cache",
                                    "Timed out waiting for {} ({}); continuing under the slot lock",
                                    name,
                                    identity.short()
                                );
                                break;
                            }
                        }
                    }
                },
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    entry.insert(SlotState::Pending(notify.clone()));
                    break;
                }
            }
        }

        let result = self.create_slot(identity, name, importpath, create).await;

        let waiters = extract_notify_handle(&self.slots, &key);
        match &result {
            Ok(entry) => {
                self.slots.insert(key, SlotState::Ready(entry.path.clone()));
            }
            Err(_) => {
                self.slots.remove(&key);
            }
        }
        if let Some(n) = waiters {
            n.notify_waiters();
        }
        result
    }

    async fn create_slot<F, Fut>(
        &self,
        identity: &DependencyIdentity,
        name: &str,
        importpath: &str,
        create: F,
    ) -> Result<CacheEntry, RepoError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<(), RepoError>>,
    {
        let cache_error = |reason: String| RepoError::CacheError {
            name: name.to_string(),
            reason,
        };

        let repos_dir = self.dir.join(REPOS_DIR);
        let staging_dir = self.dir.join(STAGING_DIR);
        for dir in [&repos_dir, &staging_dir] {
            tokio::fs::create_dir_all(dir).await.with_file_context(
                FileOperation::CreateDir,
                dir,
                "preparing cache layout",
            )?;
        }

        let _lock = CacheLock::acquire(&self.dir, identity.as_str())
            .await
            .map_err(|e| cache_error(format!("{e:#}")))?;

        let slot = self.slot_path(identity);
        if self.exists(identity) {
            tracing::debug!(target: "cache", "{} completed by another process", identity.short());
            return Ok(CacheEntry {
                path: slot,
                created: false,
            });
        }

        if tokio::fs::try_exists(&slot).await.unwrap_or(false) {
            tracing::warn!(
                target: "cache",
                "Discarding incomplete cache entry for {} at {}",
                name,
                slot.display()
            );
            let partial = slot.clone();
            run_blocking(move || fs_utils::remove_dir_all(&partial))
                .await
                .map_err(&cache_error)?;
        }
        let record_path = self.record_path(identity);
        match tokio::fs::remove_file(&record_path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(RepoError::from(e)),
            _ => {}
        }

        let staging = tempfile::Builder::new()
            .prefix(&format!("{}-", identity.short()))
            .tempdir_in(&staging_dir)
            .with_file_context(FileOperation::CreateDir, &staging_dir, "creating staging directory")?;
        let tree = staging.path().join("tree");
        tokio::fs::create_dir(&tree).await.with_file_context(
            FileOperation::CreateDir,
            &tree,
            "creating staging tree",
        )?;

        tracing::debug!(target: "cache", "Materializing {} into {}", name, tree.display());
        create(tree.clone()).await?;

        let writable = tree.clone();
        run_blocking(move || fs_utils::make_owner_writable(&writable))
            .await
            .map_err(&cache_error)?;

        tokio::fs::rename(&tree, &slot).await.with_file_context(
            FileOperation::Rename,
            &slot,
            "publishing materialized tree",
        )?;

        let record = CompletionRecord {
            identity: identity.clone(),
            name: name.to_string(),
            importpath: importpath.to_string(),
            completed_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| cache_error(format!("cannot encode completion record: {e}")))?;
        let marker = record_path.clone();
        run_blocking(move || fs_utils::atomic_write(&marker, &bytes))
            .await
            .map_err(&cache_error)?;

        tracing::info!(target: "cache", "Materialized {} at {}", name, slot.display());
        Ok(CacheEntry {
            path: slot,
            created: true,
        })
    }

    /// Remove staging directories older than `max_age`.
    ///
    /// Staging directories of a live fetch are young; old ones were left by an
    /// interrupted run. Returns how many were removed.
    pub async fn remove_stale_staging(&self, max_age: Duration) -> Result<usize, RepoError> {
        let staging_dir = self.dir.join(STAGING_DIR);
        let mut entries = match tokio::fs::read_dir(&staging_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e)
                    .with_file_context(FileOperation::Read, &staging_dir, "listing staging")
                    .map_err(RepoError::from);
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let modified = entry.metadata().await.and_then(|m| m.modified());
            let stale = modified
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .is_some_and(|age| age >= max_age);
            if !stale {
                continue;
            }
            let path = entry.path();
            tracing::debug!(target: "cache", "Removing stale staging {}", path.display());
            run_blocking(move || fs_utils::remove_dir_all(&path))
                .await
                .map_err(RepoError::other)?;
            removed += 1;
        }
        Ok(removed)
    }
}

async fn run_blocking<F>(f: F) -> Result<(), String>
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| format!("blocking task failed: {e}"))?
        .map_err(|e| format!("{e:#}"))
}
