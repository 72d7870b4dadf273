//! Builder for running external tools with timeouts and typed errors.
//!
//! ```rust,no_run
//! use extrepo::tool::ToolCommand;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), extrepo::core::RepoError> {
//! let output = ToolCommand::git()
//!     .args(["rev-parse", "HEAD"])
//!     .current_dir("/tmp/checkout")
//!     .timeout(Duration::from_secs(30))
//!     .with_context("errors_go_git")
//!     .execute()
//!     .await?;
//! println!("{}", output.stdout.trim());
//! # Ok(())
//! # }
//! ```
//!
//! The program is located with `which` before spawning, so a missing tool
//! surfaces as [`RepoError::ToolNotFound`] instead of an opaque spawn error.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::RepoError;

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

/// Fluent builder for an external command.
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
}

impl ToolCommand {
    /// Command for an arbitrary program on `PATH`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            timeout_duration: Some(Duration::from_secs(300)),
            context: None,
        }
    }

    /// `git`, with terminal prompts disabled.
    pub fn git() -> Self {
        Self::new("git").env("GIT_TERMINAL_PROMPT", "0")
    }

    /// The system `patch` tool.
    pub fn patch() -> Self {
        Self::new("patch")
    }

    /// Run in `dir`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Replace the default five-minute timeout.
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = Some(duration);
        self
    }

    /// Label included in log lines (usually the repository name).
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the command and require a zero exit status.
    ///
    /// # Errors
    ///
    /// - [`RepoError::ToolNotFound`] when the program is not on `PATH`
    /// - [`RepoError::ToolCommandError`] on timeout or non-zero exit; `stderr`
    ///   holds the tool's diagnostics (stdout when stderr is empty)
    /// - [`RepoError::IoError`] when spawning fails for another reason
    pub async fn execute(self) -> Result<ToolOutput, RepoError> {
        let start = Instant::now();
        let program = which::which(&self.program).map_err(|_| RepoError::ToolNotFound {
            tool: self.program.clone(),
        })?;
        let command_line = self.command_line();
        let ctx = self.context.as_deref().unwrap_or("-");

        tracing::debug!(target: "tool", "({}) Executing: {}", ctx, command_line);

        let mut cmd = Command::new(&program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        let output_future = cmd.output();
        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result?,
                Err(_) => {
                    tracing::warn!(
                        target: "tool",
                        "({}) Timed out after {}s: {}",
                        ctx,
                        duration.as_secs(),
                        command_line
                    );
                    return Err(RepoError::ToolCommandError {
                        command: command_line,
                        stderr: format!("timed out after {} seconds", duration.as_secs()),
                    });
                }
            },
            None => output_future.await?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "tool",
                "({}) Exit code {:?}: {}",
                ctx,
                output.status.code(),
                stderr.trim()
            );
            let diagnostics = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(RepoError::ToolCommandError {
                command: command_line,
                stderr: diagnostics.trim().to_string(),
            });
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(
                target: "tool::perf",
                "({}) {} took {:.2}s",
                ctx,
                self.program,
                elapsed.as_secs_f64()
            );
        } else {
            tracing::trace!(target: "tool::perf", "({}) {} took {}ms", ctx, self.program, elapsed.as_millis());
        }

        Ok(ToolOutput { stdout, stderr })
    }
}
