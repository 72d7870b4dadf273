//! Git test helper utilities
//!
//! Builds throwaway local repositories that VCS-pinned declarations can clone
//! with a plain filesystem path as `remote`.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// A local git repository used as a fetch source.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// `git init` with a test identity and no commit signing.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.repo_path)
            .with_context(|| format!("Failed to create {}", self.repo_path.display()))?;
        self.run_git_command(&["init", "--quiet"], "Failed to initialize git repository")?;
        self.run_git_command(
            &["config", "user.email", "test@extrepo.example"],
            "Failed to configure git user email",
        )?;
        self.run_git_command(&["config", "user.name", "Test User"], "Failed to configure git user name")?;
        self.run_git_command(&["config", "commit.gpgsign", "false"], "Failed to disable signing")?;
        Ok(())
    }

    /// Write `files` (relative path, content) into the work tree.
    pub fn write_files(&self, files: &[(&str, &str)]) -> Result<()> {
        for (rel, content) in files {
            let path = self.repo_path.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Ok(())
    }

    /// Stage everything and commit; returns the new commit hash.
    pub fn commit_all(&self, message: &str) -> Result<String> {
        self.run_git_command(&["add", "-A"], "Failed to add files to git")?;
        self.run_git_command(&["commit", "--quiet", "-m", message], "Failed to create git commit")?;
        self.head()
    }

    /// Current `HEAD` commit.
    pub fn head(&self) -> Result<String> {
        let output = self.run_git_command(&["rev-parse", "HEAD"], "Failed to read HEAD")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}
