//! `extrepo cache-dir`: print the cache store root.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::common::load_engine_config;

/// Print the resolved cache directory.
#[derive(Args, Debug)]
pub struct CacheDirCommand {}

impl CacheDirCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let engine = load_engine_config(config_path).await?;
        println!("{}", engine.cache_dir.display());
        Ok(())
    }
}
