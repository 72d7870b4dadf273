//! Runtime configuration.
//!
//! Settings are resolved in this order, highest priority first:
//!
//! 1. Environment variables (`EXTREPO_CACHE_DIR`, `EXTREPO_PROXY`)
//! 2. The global config file ([`GlobalConfig`])
//! 3. Built-in defaults (`~/.extrepo/cache`, `https://proxy.golang.org`)
//!
//! The resolved result is an [`EngineConfig`], which is what the materializer and
//! fetchers consume. Library code never reads the environment after this point.

pub mod global;

pub use global::GlobalConfig;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MODULE_PROXY, default_max_parallel};
use crate::core::{FileOperation, FileResultExt};

/// Overrides the cache store root.
pub const CACHE_DIR_ENV: &str = "EXTREPO_CACHE_DIR";
/// Overrides the module proxy URL.
pub const PROXY_ENV: &str = "EXTREPO_PROXY";

/// Fully resolved settings for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Cache store root
    pub cache_dir: PathBuf,
    /// Module proxy base URL, without trailing slash
    pub module_proxy: String,
    /// Concurrent materializations in a batch
    pub max_parallel: usize,
    /// HTTP timeout for a single download
    pub fetch_timeout: Duration,
}

impl EngineConfig {
    /// Defaults rooted at an explicit cache directory. Used by tests and embedders.
    #[must_use]
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            module_proxy: DEFAULT_MODULE_PROXY.to_string(),
            max_parallel: default_max_parallel(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }

    /// Builder-style proxy override.
    #[must_use]
    pub fn with_module_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.module_proxy = proxy.into().trim_end_matches('/').to_string();
        self
    }

    /// Resolve from the global config and the process environment.
    pub fn resolve(global: &GlobalConfig) -> Result<Self> {
        Self::resolve_with_env(global, |key| std::env::var(key).ok())
    }

    /// Resolve with an injectable environment lookup.
    pub fn resolve_with_env(
        global: &GlobalConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let cache_dir = match env(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            Some(dir) => expand_path(&dir)?,
            None => match &global.cache_dir {
                Some(dir) => expand_path(dir)?,
                None => default_cache_dir()?,
            },
        };

        let module_proxy = env(PROXY_ENV)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| global.module_proxy.clone());

        let max_parallel = global.max_parallel.filter(|n| *n > 0).unwrap_or_else(default_max_parallel);

        Ok(Self {
            cache_dir,
            module_proxy: module_proxy.trim_end_matches('/').to_string(),
            max_parallel,
            fetch_timeout: Duration::from_secs(global.fetch_timeout_secs),
        })
    }
}

/// `~/.extrepo` (or `%LOCALAPPDATA%\extrepo` on Windows).
pub fn extrepo_home() -> Result<PathBuf> {
    let home = if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
            .join("extrepo")
    } else {
        dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".extrepo")
    };
    Ok(home)
}

/// Default cache store root: `{extrepo_home}/cache`.
pub fn default_cache_dir() -> Result<PathBuf> {
    Ok(extrepo_home()?.join("cache"))
}

/// Create the cache root if needed.
pub fn ensure_cache_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).with_file_context(
            FileOperation::CreateDir,
            path,
            "creating cache directory",
        )?;
    }
    Ok(())
}

fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .with_context(|| format!("Failed to expand path '{raw}'"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
