//! `extrepo snapshot`: render the repository config snapshot.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::manifest::{Manifest, find_manifest_with_optional};
use crate::snapshot;

/// Render the snapshot of every declaration to stdout or a file.
#[derive(Args, Debug)]
pub struct SnapshotCommand {
    /// Write to this file instead of stdout; left untouched when unchanged
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fail if the file at --output is missing or out of date instead of writing it
    #[arg(long, requires = "output")]
    check: bool,
}

impl SnapshotCommand {
    pub async fn execute(self, manifest_path: Option<PathBuf>) -> Result<()> {
        let manifest_path = find_manifest_with_optional(manifest_path)?;
        let manifest = Manifest::load(&manifest_path)?;
        for rejected in &manifest.rejected {
            tracing::warn!("{rejected}");
        }

        let text = snapshot::render(&manifest.declarations, manifest.repo_scopes());
        let Some(output) = self.output else {
            print!("{text}");
            return Ok(());
        };

        if self.check {
            let current = match std::fs::read_to_string(&output) {
                Ok(current) => current,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read {}", output.display()));
                }
            };
            snapshot::parse(&current)
                .with_context(|| format!("{} is not a valid snapshot", output.display()))?;
            if current != text {
                bail!("{} is out of date; run `extrepo snapshot --output {}`", output.display(), output.display());
            }
            println!("{} {} is up to date", "✓".green(), output.display());
            return Ok(());
        }

        if snapshot::write_snapshot(&output, &text)? {
            println!("{} Wrote {}", "✓".green(), output.display());
        } else {
            println!("{} {} is up to date", "✓".green(), output.display());
        }
        Ok(())
    }
}
