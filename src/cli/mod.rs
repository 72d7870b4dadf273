//! Command-line interface for extrepo.
//!
//! # Available Commands
//!
//! - `fetch` - Materialize declared repositories into the cache
//! - `generate` - Print the build targets generated for one repository as JSON
//! - `snapshot` - Write (or check) the repository config snapshot
//! - `cache-dir` - Print the cache store root
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet` - log level (`RUST_LOG` takes precedence when set)
//! - `--config` - alternative global config file
//! - `--manifest-path` - explicit `extrepo.toml`, instead of searching upward
//!
//! ```bash
//! extrepo fetch
//! extrepo fetch errors_go_mod com_github_apex_log
//! extrepo generate com_github_apex_log --package handlers/text
//! extrepo snapshot --output repositories.bzl
//! extrepo snapshot --output repositories.bzl --check
//! ```

mod cache;
mod common;
mod fetch;
mod generate;
mod snapshot;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use common::CommandContext;

/// Logging and config settings derived from the global flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Log filter directive, or `None` for errors only
    pub log_level: Option<String>,
    /// Alternative global config file
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the global `tracing` subscriber. `RUST_LOG` wins when set.
    pub fn init_logging(&self) {
        let filter = match std::env::var("RUST_LOG") {
            Ok(value) if !value.is_empty() => EnvFilter::new(value),
            _ => EnvFilter::new(self.log_level.as_deref().unwrap_or("error")),
        };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// External Go repository materialization engine.
#[derive(Parser, Debug)]
#[command(
    name = "extrepo",
    about = "Fetch, patch and generate build targets for external Go repositories",
    version,
    long_about = "extrepo materializes pinned Go dependencies declared in extrepo.toml into a shared \
                  cache, applies patches, and generates build targets for their packages."
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the global configuration file (default `~/.extrepo/config.toml`).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to extrepo.toml. By default it is searched for from the current
    /// directory upward.
    #[arg(long, global = true)]
    manifest_path: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Materialize repositories into the cache.
    Fetch(fetch::FetchCommand),

    /// Print the targets generated for a repository as JSON.
    Generate(generate::GenerateCommand),

    /// Render the repository config snapshot.
    Snapshot(snapshot::SnapshotCommand),

    /// Print the cache directory.
    #[command(name = "cache-dir")]
    CacheDir(cache::CacheDirCommand),
}

impl Cli {
    /// Execute the parsed command line.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    /// Translate global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("warn".to_string())
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    /// Execute with an explicit configuration. Logging is left to the caller.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let config_path = config.config_path;
        match self.command {
            Commands::Fetch(cmd) => cmd.execute(self.manifest_path, config_path).await,
            Commands::Generate(cmd) => cmd.execute(self.manifest_path, config_path).await,
            Commands::Snapshot(cmd) => cmd.execute(self.manifest_path).await,
            Commands::CacheDir(cmd) => cmd.execute(config_path).await,
        }
    }
}
