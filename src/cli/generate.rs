//! `extrepo generate`: print generated targets as JSON.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use super::common::CommandContext;
use crate::generate::{ImportIndex, targets_under};

/// Materialize one repository and print its targets.
#[derive(Args, Debug)]
pub struct GenerateCommand {
    /// Repository name
    name: String,

    /// Only targets in this package directory or below it
    #[arg(long)]
    package: Option<String>,
}

impl GenerateCommand {
    pub async fn execute(
        self,
        manifest_path: Option<PathBuf>,
        config_path: Option<PathBuf>,
    ) -> Result<()> {
        let ctx = CommandContext::load(manifest_path, config_path).await?;
        let decl = ctx.manifest.get(&self.name)?;
        let index =
            Arc::new(ImportIndex::from_declarations(&ctx.manifest.declarations, &ctx.manifest.stream));

        let repo = ctx.materializer()?.materialize(decl, &ctx.manifest.stream, index).await?;
        let targets = targets_under(&repo.targets, self.package.as_deref().unwrap_or(""));
        if targets.is_empty() {
            eprintln!("no targets found for {}", self.name);
        }
        println!("{}", serde_json::to_string_pretty(&targets)?);
        Ok(())
    }
}
