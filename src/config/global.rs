//! User-level configuration file (`~/.extrepo/config.toml`).
//!
//! ```toml
//! cache_dir = "~/work/.extrepo-cache"
//! module_proxy = "https://proxy.golang.org"
//! max_parallel = 16
//! fetch_timeout_secs = 600
//! ```
//!
//! Every field is optional. The file itself is optional; a missing file yields
//! [`GlobalConfig::default`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::constants::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MODULE_PROXY};

/// Environment variable pointing at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "EXTREPO_CONFIG";

fn default_module_proxy() -> String {
    DEFAULT_MODULE_PROXY.to_string()
}

const fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn is_default_module_proxy(proxy: &str) -> bool {
    proxy == DEFAULT_MODULE_PROXY
}

fn is_default_fetch_timeout(secs: &u64) -> bool {
    *secs == DEFAULT_FETCH_TIMEOUT_SECS
}

/// Settings shared by every project on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Cache store root. Supports `~` and environment variable expansion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,

    /// Module proxy base URL (`https://` or `file://`).
    #[serde(default = "default_module_proxy", skip_serializing_if = "is_default_module_proxy")]
    pub module_proxy: String,

    /// Upper bound on concurrent materializations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    /// HTTP timeout for downloads, in seconds.
    #[serde(
        default = "default_fetch_timeout_secs",
        skip_serializing_if = "is_default_fetch_timeout"
    )]
    pub fetch_timeout_secs: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            module_proxy: default_module_proxy(),
            max_parallel: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl GlobalConfig {
    /// Load from `path` if given, else from `EXTREPO_CONFIG`, else from the default path.
    ///
    /// A file that does not exist yields the default configuration.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None => match std::env::var_os(CONFIG_PATH_ENV) {
                Some(p) => PathBuf::from(p),
                None => Self::default_path()?,
            },
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!(target: "config", "No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))
    }

    /// Save as pretty TOML, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))
    }

    /// `~/.extrepo/config.toml`, or `%LOCALAPPDATA%\extrepo\config.toml` on Windows.
    pub fn default_path() -> Result<PathBuf> {
        Ok(super::extrepo_home()?.join("config.toml"))
    }
}
