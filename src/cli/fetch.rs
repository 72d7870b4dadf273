//! `extrepo fetch`: materialize repositories into the cache.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::CommandContext;
use crate::constants::STALE_STAGING_AGE;
use crate::materialize::BatchReport;

/// Materialize every declared repository, or only the named ones.
#[derive(Args, Debug)]
pub struct FetchCommand {
    /// Repository names; all declarations when omitted
    names: Vec<String>,

    /// Maximum concurrent materializations (overrides the global config)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    max_parallel: Option<u16>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl FetchCommand {
    pub async fn execute(
        self,
        manifest_path: Option<PathBuf>,
        config_path: Option<PathBuf>,
    ) -> Result<()> {
        let mut ctx = CommandContext::load(manifest_path, config_path).await?;
        if let Some(n) = self.max_parallel {
            ctx.engine.max_parallel = usize::from(n);
        }

        let materializer = ctx.materializer()?;
        match materializer.cache().remove_stale_staging(STALE_STAGING_AGE).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Removed {n} stale staging directories"),
            Err(e) => tracing::warn!("Could not clean staging directories: {e}"),
        }

        let report = materializer.materialize_manifest(&ctx.manifest, &self.names).await?;
        if self.json {
            print_json(&report)?;
        } else {
            print_report(&report);
        }

        if !report.is_success() {
            bail!(
                "{} of {} repositories failed",
                report.failures.len(),
                report.failures.len() + report.materialized.len()
            );
        }
        Ok(())
    }
}

fn print_report(report: &BatchReport) {
    for repo in &report.materialized {
        let state = if repo.fetched { "fetched".green() } else { "cached".dimmed() };
        println!(
            "{} {} {} [{}] {}",
            "✓".green(),
            repo.name.bold(),
            repo.identity.short(),
            state,
            repo.path.display()
        );
    }
    for failure in &report.failures {
        println!("{} {}", "✗".red(), failure);
    }
}

fn print_json(report: &BatchReport) -> Result<()> {
    let failures: Vec<serde_json::Value> = report
        .failures
        .iter()
        .map(|f| {
            serde_json::json!({
                "name": f.repository(),
                "retryable": f.is_retryable(),
                "error": f.to_string(),
            })
        })
        .collect();
    let value = serde_json::json!({
        "materialized": report.materialized,
        "failures": failures,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
