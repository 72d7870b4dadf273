//! Shared setup for commands that operate on a manifest.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::config::{EngineConfig, GlobalConfig, ensure_cache_dir};
use crate::manifest::{Manifest, find_manifest_with_optional};
use crate::materialize::Materializer;

/// A loaded manifest and the engine configuration to run it with.
#[derive(Debug)]
pub struct CommandContext {
    /// The loaded manifest
    pub manifest: Manifest,
    /// Where it was loaded from
    pub manifest_path: PathBuf,
    /// Resolved engine settings
    pub engine: EngineConfig,
}

impl CommandContext {
    /// Locate and load the manifest, then resolve the engine configuration.
    pub async fn load(manifest_path: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Self> {
        let manifest_path = find_manifest_with_optional(manifest_path)?;
        let manifest = Manifest::load(&manifest_path)?;
        let engine = load_engine_config(config_path).await?;
        Ok(Self {
            manifest,
            manifest_path,
            engine,
        })
    }

    /// A materializer over the configured cache, creating the cache root if needed.
    pub fn materializer(&self) -> Result<Materializer> {
        ensure_cache_dir(&self.engine.cache_dir)?;
        Materializer::new(&self.engine).context("Failed to set up the fetcher")
    }
}

/// Resolve [`EngineConfig`] from the global config file and the environment.
pub async fn load_engine_config(config_path: Option<PathBuf>) -> Result<EngineConfig> {
    let global = GlobalConfig::load_with_optional(config_path).await?;
    EngineConfig::resolve(&global)
}
