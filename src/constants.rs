//! Global constants shared across modules.

use std::time::Duration;

/// How long an in-process waiter sleeps on a pending cache slot before re-checking.
pub const PENDING_STATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for `git clone` / `git fetch`.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for local git commands (checkout, rev-parse).
pub const GIT_LOCAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for a single `patch` invocation.
pub const PATCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Staging directories older than this were left by an interrupted run.
pub const STALE_STAGING_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Default HTTP timeout for module proxy and archive downloads, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 600;

/// Minimum number of parallel materializations regardless of CPU count.
pub const MIN_PARALLELISM: usize = 10;

/// Multiplier applied to CPU core count for default parallelism.
pub const PARALLELISM_CORE_MULTIPLIER: usize = 2;

/// Default CPU core count when detection fails.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Default module proxy.
pub const DEFAULT_MODULE_PROXY: &str = "https://proxy.golang.org";

/// Arguments passed to `patch` when a declaration does not set `patch_args`.
pub const DEFAULT_PATCH_ARGS: &[&str] = &["-p0"];

/// Build file names recognized when a declaration does not set `build_file_names`.
pub const DEFAULT_BUILD_FILE_NAMES: &[&str] = &["BUILD.bazel", "BUILD"];

/// Header line of the repository config snapshot.
pub const SNAPSHOT_HEADER: &str = "# Code generated by extrepo; DO NOT EDIT.";

/// Manifest file name looked up in the working directory.
pub const MANIFEST_FILE_NAME: &str = "extrepo.toml";

/// Default parallelism: `max(MIN_PARALLELISM, cores * PARALLELISM_CORE_MULTIPLIER)`.
#[must_use]
pub fn default_max_parallel() -> usize {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(FALLBACK_CORE_COUNT);
    std::cmp::max(MIN_PARALLELISM, cores * PARALLELISM_CORE_MULTIPLIER)
}
