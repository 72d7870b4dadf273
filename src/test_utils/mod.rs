//! Test utilities for extrepo.
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration suite.
//!
//! - [`init_test_logging`] - one-time `tracing` setup for tests
//! - [`ModuleProxyFixture`] - a `file://` module proxy with computed `h1:` sums
//! - [`TestGit`] - local git repositories for commit-pinned declarations
//! - [`ManifestFixture`] - writes `extrepo.toml`

pub mod fixtures;
pub mod git_helper;

pub use fixtures::{ManifestFixture, ModuleProxyFixture};
pub use git_helper::TestGit;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=extrepo=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// Whether the `patch` tool is available; tests that need it skip otherwise.
pub fn has_patch_tool() -> bool {
    which::which("patch").is_ok()
}

/// Whether `git` is available; tests that need it skip otherwise.
pub fn has_git() -> bool {
    which::which("git").is_ok()
}
