//! End-to-end materialization of declared repositories.
//!
//! For one declaration the steps run strictly in order:
//!
//! 1. resolve the repository's directives (a malformed scope fails here, before any I/O)
//! 2. compute the [`DependencyIdentity`]; an unpinned declaration fails here
//! 3. [`Cache::get_or_create`]: fetch into staging, apply patches, publish
//! 4. generate build targets from the published tree
//!
//! Step 3 is skipped entirely when the identity is already complete in the
//! cache. Batches run independent declarations concurrently, bounded by
//! `max_parallel`, and collect failures instead of stopping at the first one.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::EngineConfig;
use crate::core::RepoError;
use crate::declaration::{DependencyDeclaration, DependencyIdentity};
use crate::directive::DirectiveStream;
use crate::fetch::{Fetcher, SourceFetcher};
use crate::generate::{self, GenerateContext, GeneratedTarget, ImportIndex};
use crate::manifest::Manifest;
use crate::patch;

/// A fetched, patched tree in the cache, with its generated targets.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializedRepository {
    /// Repository name
    pub name: String,
    /// Declared import path
    pub importpath: String,
    /// Cache identity
    pub identity: DependencyIdentity,
    /// Tree location in the cache
    pub path: PathBuf,
    /// Whether this call fetched the tree (false when it was already cached)
    pub fetched: bool,
    /// Generated build targets
    pub targets: Vec<GeneratedTarget>,
}

/// Outcome of a batch: every declaration ends up in exactly one list.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Successfully materialized repositories, sorted by name
    pub materialized: Vec<MaterializedRepository>,
    /// Failures, sorted by repository name
    pub failures: Vec<RepoError>,
}

impl BatchReport {
    /// Whether every declaration succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of repositories fetched (not served from the cache) in this batch.
    #[must_use]
    pub fn fetched_count(&self) -> usize {
        self.materialized.iter().filter(|r| r.fetched).count()
    }
}

/// Drives fetch, patch and generation against one cache.
pub struct Materializer {
    cache: Cache,
    fetcher: Arc<dyn Fetcher>,
    max_parallel: usize,
}

impl Materializer {
    /// Materializer with the default [`SourceFetcher`].
    pub fn new(config: &EngineConfig) -> Result<Self, RepoError> {
        let fetcher = SourceFetcher::new(config)?;
        Ok(Self::with_fetcher(
            Cache::new(config.cache_dir.clone()),
            Arc::new(fetcher),
            config.max_parallel,
        ))
    }

    /// Materializer with an explicit fetch capability.
    #[must_use]
    pub fn with_fetcher(cache: Cache, fetcher: Arc<dyn Fetcher>, max_parallel: usize) -> Self {
        Self {
            cache,
            fetcher,
            max_parallel: max_parallel.max(1),
        }
    }

    /// The underlying cache.
    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Materialize one declaration and generate its targets.
    pub async fn materialize(
        &self,
        decl: &DependencyDeclaration,
        stream: &DirectiveStream,
        index: Arc<ImportIndex>,
    ) -> Result<MaterializedRepository, RepoError> {
        let directives = stream.resolve(decl)?;
        let identity = decl.identity().await?;

        let fetcher = Arc::clone(&self.fetcher);
        let entry = self
            .cache
            .get_or_create(&identity, &decl.name, &decl.importpath, |tree| async move {
                fetcher.fetch(decl, &tree).await?;
                patch::apply(decl, &tree).await
            })
            .await?;

        let ctx = GenerateContext::new(decl, directives, index);
        let tree = entry.path.clone();
        let targets = tokio::task::spawn_blocking(move || generate::generate(&tree, &ctx))
            .await
            .map_err(|e| RepoError::GenerateError {
                name: decl.name.clone(),
                reason: format!("generation task failed: {e}"),
            })??;

        Ok(MaterializedRepository {
            name: decl.name.clone(),
            importpath: decl.importpath.clone(),
            identity,
            path: entry.path,
            fetched: entry.created,
            targets,
        })
    }

    /// Materialize `decls` concurrently. One failure never stops the others.
    pub async fn materialize_all(
        &self,
        decls: &[&DependencyDeclaration],
        directives: &DirectiveStream,
        index: Arc<ImportIndex>,
    ) -> BatchReport {
        let total = decls.len();
        tracing::info!(
            target: "materialize",
            "Materializing {} repositories (max {} in parallel)",
            total,
            self.max_parallel
        );

        let results: Vec<Result<MaterializedRepository, RepoError>> = stream::iter(decls.iter().copied())
            .map(|decl| {
                let index = Arc::clone(&index);
                async move {
                    let result = self.materialize(decl, directives, index).await;
                    if let Err(err) = &result {
                        tracing::warn!(target: "materialize", "{err}");
                    }
                    result
                }
            })
            .buffer_unordered(self.max_parallel)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for result in results {
            match result {
                Ok(repo) => report.materialized.push(repo),
                Err(err) => report.failures.push(err),
            }
        }
        report.materialized.sort_by(|a, b| a.name.cmp(&b.name));
        report.failures.sort_by(|a, b| a.repository().cmp(&b.repository()));

        tracing::info!(
            target: "materialize",
            "{} of {} repositories ready ({} fetched), {} failed",
            report.materialized.len(),
            total,
            report.fetched_count(),
            report.failures.len()
        );
        report
    }

    /// Materialize the declarations of `manifest` named in `names`, or all of them.
    ///
    /// Imports resolve against every declaration in the manifest, selected or not.
    /// With no names given, declarations rejected at load time are reported as
    /// failures of the batch.
    pub async fn materialize_manifest(
        &self,
        manifest: &Manifest,
        names: &[String],
    ) -> Result<BatchReport, RepoError> {
        let selected = manifest.select(names)?;
        let index = Arc::new(ImportIndex::from_declarations(&manifest.declarations, &manifest.stream));

        let mut report = self.materialize_all(&selected, &manifest.stream, index).await;
        if names.is_empty() && !manifest.rejected.is_empty() {
            report
                .failures
                .extend(manifest.rejected.iter().map(crate::core::error::clone_for_display));
            report.failures.sort_by(|a, b| a.repository().cmp(&b.repository()));
        }
        Ok(report)
    }
}
