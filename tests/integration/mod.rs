//! Integration test suite for extrepo
//!
//! End-to-end tests against a `file://` module proxy and local git
//! repositories. Nothing here uses the network.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **materialize**: module-pinned repositories through the library API
//! - **vcs**: commit-pinned repositories, patches and forks
//! - **snapshot**: snapshot rendering and round trips
//! - **cli**: the `extrepo` binary

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli;
mod materialize;
mod snapshot;
mod vcs;
