//! extrepo - external Go repository materialization engine
//!
//! Given pinned Go dependencies declared in `extrepo.toml`, extrepo fetches each
//! source tree into a shared, content-addressed cache, applies patches, and
//! generates build targets describing the tree's packages. It also renders a
//! deterministic snapshot of the declared repository set that later invocations
//! read instead of re-resolving.
//!
//! # Architecture Overview
//!
//! ```text
//! extrepo.toml ──► manifest ──► directive ──► materialize
//!                                                │
//!                    ┌───────────────────────────┤
//!                    ▼                           ▼
//!        cache (get_or_create)              generate ──► Vec<GeneratedTarget>
//!          fetch ─► patch ─► publish
//!
//! manifest ──► snapshot ──► "Code generated by extrepo; DO NOT EDIT."
//! ```
//!
//! # Core Modules
//!
//! ## Declarations and directives
//! - [`declaration`] - Declarations, pin modes, identities and naming conventions
//! - [`directive`] - `gazelle:` directive parsing, scoped streams and walk scopes
//! - [`manifest`] - The `extrepo.toml` registry
//!
//! ## Materialization
//! - [`fetch`] - Module proxy, git and archive fetchers with checksum verification
//! - [`patch`] - Ordered patch application via the system `patch` tool
//! - [`cache`] - Shared on-disk cache keyed by identity, with in-process and file locks
//! - [`materialize`] - Orchestration of the above, single and batched
//!
//! ## Outputs
//! - [`generate`] - Build targets from a materialized tree
//! - [`snapshot`] - Deterministic repository config snapshot
//!
//! ## Supporting modules
//! - [`cli`] - Command-line interface
//! - [`config`] - Global configuration (`~/.extrepo/config.toml`) and environment overrides
//! - [`core`] - Error types and user-facing error rendering
//! - [`tool`] - External tool invocation (`git`, `patch`)
//! - [`utils`] - Filesystem helpers
//!
//! # Manifest Format (extrepo.toml)
//!
//! ```toml
//! directives = [
//!     "gazelle:repo com_github_apex_log",
//!     "gazelle:exclude handlers",
//! ]
//!
//! [[repository]]
//! name = "errors_go_mod"
//! importpath = "github.com/pkg/errors"
//! version = "v0.8.1"
//! sum = "h1:iURUrRGxPUNPdy5/HRSm+Yj6okJ6UtLINN0Q9M4+h3I="
//!
//! [[repository]]
//! importpath = "github.com/apex/log"
//! version = "v1.1.0"
//! sum = "h1:J5rld6WVFi6NxA6m8GJ1LJqu3+GiTFIt3mYv27gdQWI="
//! ```
//!
//! # Command-Line Usage
//!
//! ```bash
//! extrepo fetch
//! extrepo generate errors_go_mod
//! extrepo snapshot --output repositories.bzl
//! ```

// Declarations and directives
pub mod declaration;
pub mod directive;
pub mod manifest;

// Materialization
pub mod cache;
pub mod fetch;
pub mod materialize;
pub mod patch;

// Outputs
pub mod generate;
pub mod snapshot;

// Supporting modules
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod tool;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
