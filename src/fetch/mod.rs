//! Fetching pinned source trees.
//!
//! A [`Fetcher`] turns a validated declaration into a source tree inside a
//! caller-provided, empty staging directory. It never touches the cache layout
//! itself; the cache store decides where staging lives and when the result
//! becomes visible.
//!
//! [`SourceFetcher`] dispatches on the pin mode:
//!
//! | Pin | Module |
//! |-----|--------|
//! | `version` + `sum` | [`module_proxy`]: module zip from a proxy, `h1:` verified before extraction |
//! | `commit` | [`vcs`]: `git clone` + detached checkout, `.git` removed, fork `go.mod` rewrite |
//! | `urls` + `sha256` | [`archive`]: first reachable mirror, SHA-256 verified, zip/tar/tar.gz |
//!
//! Network and VCS failures are [`RepoError::FetchUnavailable`]; content that does
//! not match its pin is [`RepoError::ChecksumMismatch`]. Nothing here retries.

pub mod archive;
pub mod dirhash;
pub mod module_proxy;
pub mod vcs;

use futures::future::BoxFuture;
use std::path::Path;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::core::RepoError;
use crate::declaration::{DependencyDeclaration, Pin};

/// Capability to materialize a pinned source tree into `dest`.
///
/// `dest` exists and is empty when `fetch` is called. On error the caller
/// discards `dest`.
pub trait Fetcher: Send + Sync {
    /// Fetch `decl` into `dest`.
    fn fetch<'a>(
        &'a self,
        decl: &'a DependencyDeclaration,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<(), RepoError>>;
}

/// HTTP(S) and `file://` downloads.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    /// Client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, RepoError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("extrepo/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepoError::other(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Download `url` into memory. The error is a human-readable reason.
    pub async fn get(&self, url: &str) -> Result<Vec<u8>, String> {
        if let Some(path) = url.strip_prefix("file://") {
            return tokio::fs::read(path).await.map_err(|e| format!("{url}: {e}"));
        }

        let response = self.client.get(url).send().await.map_err(|e| format!("{url}: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("{url}: HTTP {status}"));
        }
        response.bytes().await.map(|b| b.to_vec()).map_err(|e| format!("{url}: {e}"))
    }
}

/// Default fetcher covering every pin mode.
pub struct SourceFetcher {
    downloader: Downloader,
    module_proxy: String,
}

impl SourceFetcher {
    /// Build from resolved engine settings.
    pub fn new(config: &EngineConfig) -> Result<Self, RepoError> {
        Ok(Self {
            downloader: Downloader::new(config.fetch_timeout)?,
            module_proxy: config.module_proxy.clone(),
        })
    }
}

impl Fetcher for SourceFetcher {
    fn fetch<'a>(
        &'a self,
        decl: &'a DependencyDeclaration,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<(), RepoError>> {
        Box::pin(async move {
            tracing::info!(
                target: "fetch",
                "Fetching {} ({}) at {}",
                decl.name,
                decl.importpath,
                decl.pin.describe()
            );
            match &decl.pin {
                Pin::Module { version, sum } => {
                    module_proxy::fetch_module(
                        &self.downloader,
                        &self.module_proxy,
                        decl,
                        version,
                        sum,
                        dest,
                    )
                    .await
                }
                Pin::Vcs { commit, remote, replace, .. } => {
                    vcs::fetch_commit(decl, remote, commit, replace.as_deref(), dest).await
                }
                Pin::Archive { urls, sha256, strip_prefix } => {
                    archive::fetch_archive(
                        &self.downloader,
                        decl,
                        urls,
                        sha256,
                        strip_prefix.as_deref(),
                        dest,
                    )
                    .await
                }
                Pin::Unpinned => Err(RepoError::AmbiguousDeclaration {
                    name: decl.name.clone(),
                    importpath: decl.importpath.clone(),
                    reason: "declaration has no pin and cannot be fetched".to_string(),
                }),
            }
        })
    }
}

/// `FetchUnavailable` for `decl` with `reason`.
pub(crate) fn unavailable(decl: &DependencyDeclaration, reason: impl Into<String>) -> RepoError {
    RepoError::FetchUnavailable {
        name: decl.name.clone(),
        importpath: decl.importpath.clone(),
        pin: decl.pin.describe(),
        reason: reason.into(),
    }
}

/// `ChecksumMismatch` for `decl`.
pub(crate) fn mismatch(
    decl: &DependencyDeclaration,
    expected: impl Into<String>,
    actual: impl Into<String>,
) -> RepoError {
    RepoError::ChecksumMismatch {
        name: decl.name.clone(),
        importpath: decl.importpath.clone(),
        pin: decl.pin.describe(),
        expected: expected.into(),
        actual: actual.into(),
    }
}
