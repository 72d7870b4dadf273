//! Common test utilities and fixtures for extrepo integration tests
//!
//! A [`TestProject`] owns a temporary directory holding a project (with its
//! `extrepo.toml`), an isolated cache, and a `file://` module proxy. No test
//! touches the network or the user's real cache.

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::Result;
use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use extrepo::config::{CACHE_DIR_ENV, EngineConfig, PROXY_ENV};
use extrepo::config::global::CONFIG_PATH_ENV;
use extrepo::manifest::Manifest;
use extrepo::materialize::Materializer;
use extrepo::test_utils::{ManifestFixture, ModuleProxyFixture, TestGit};

/// `github.com/pkg/errors` at v0.8.1, reduced to its package structure.
pub const ERRORS_FILES: &[(&str, &str)] = &[
    ("LICENSE", "Copyright (c) 2015, Dave Cheney\n"),
    ("README.md", "# errors\n"),
    (
        "errors.go",
        "// Package errors provides simple error handling primitives.\npackage errors\n\nimport (\n\t\"fmt\"\n\t\"io\"\n)\n\nfunc New(message string) error { return nil }\n",
    ),
    (
        "stack.go",
        "package errors\n\nimport (\n\t\"fmt\"\n\t\"io\"\n\t\"path\"\n\t\"runtime\"\n\t\"strings\"\n)\n",
    ),
    ("errors_test.go", "package errors\n\nimport (\n\t\"errors\"\n\t\"testing\"\n)\n"),
    (
        "example_test.go",
        "package errors_test\n\nimport (\n\t\"fmt\"\n\n\t\"github.com/pkg/errors\"\n)\n",
    ),
];

/// `github.com/apex/log` at v1.1.0, reduced to its package structure.
pub const APEX_LOG_FILES: &[(&str, &str)] = &[
    ("go.mod", "module github.com/apex/log\n"),
    (
        "logger.go",
        "package log\n\nimport (\n\t\"fmt\"\n\t\"time\"\n\n\t\"github.com/pkg/errors\"\n)\n",
    ),
    ("levels.go", "package log\n\nimport (\n\t\"bytes\"\n\t\"strings\"\n)\n"),
    (
        "handlers/text/text.go",
        "package text\n\nimport (\n\t\"github.com/apex/log\"\n\t\"github.com/fatih/color\"\n)\n",
    ),
    ("handlers/json/json.go", "package json\n\nimport \"github.com/apex/log\"\n"),
    ("_examples/basic/main.go", "package main\n\nimport \"github.com/apex/log\"\n"),
];

pub const ERRORS_IMPORTPATH: &str = "github.com/pkg/errors";
pub const APEX_LOG_IMPORTPATH: &str = "github.com/apex/log";

/// An isolated project with its own cache and module proxy.
pub struct TestProject {
    _temp: TempDir,
    project_dir: PathBuf,
    cache_dir: PathBuf,
    proxy: ModuleProxyFixture,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        extrepo::test_utils::init_test_logging(None);
        let temp = TempDir::new()?;
        let project_dir = temp.path().join("project");
        std::fs::create_dir_all(&project_dir)?;
        let cache_dir = temp.path().join("cache");
        let proxy = ModuleProxyFixture::new(temp.path().join("proxy"));
        Ok(Self {
            _temp: temp,
            project_dir,
            cache_dir,
            proxy,
        })
    }

    pub fn project_path(&self) -> &Path {
        &self.project_dir
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_dir
    }

    pub fn proxy(&self) -> &ModuleProxyFixture {
        &self.proxy
    }

    /// Publish errors v0.8.1 and apex/log v1.1.0; returns their sums.
    pub fn publish_standard_modules(&self) -> Result<(String, String)> {
        let errors = self.proxy.publish(ERRORS_IMPORTPATH, "v0.8.1", ERRORS_FILES)?;
        let log = self.proxy.publish(APEX_LOG_IMPORTPATH, "v1.1.0", APEX_LOG_FILES)?;
        Ok((errors, log))
    }

    /// A local git repository under the temp dir.
    pub fn git_repo(&self, name: &str) -> Result<TestGit> {
        let git = TestGit::new(self.project_dir.parent().unwrap_or(&self.project_dir).join("git").join(name));
        git.init()?;
        Ok(git)
    }

    pub fn write_manifest(&self, content: &str) -> Result<PathBuf> {
        ManifestFixture::write(&self.project_dir, content)
    }

    pub fn write_file(&self, rel: &str, content: &str) -> Result<PathBuf> {
        let path = self.project_dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn load_manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.project_dir.join("extrepo.toml"))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::with_cache_dir(&self.cache_dir).with_module_proxy(self.proxy.url())
    }

    pub fn materializer(&self) -> Result<Materializer> {
        Ok(Materializer::new(&self.engine_config())?)
    }

    /// The `extrepo` binary, run in the project directory against this project's
    /// cache and proxy.
    pub fn extrepo(&self) -> Command {
        let mut cmd = Command::cargo_bin("extrepo").expect("extrepo binary");
        cmd.current_dir(&self.project_dir)
            .env(CACHE_DIR_ENV, &self.cache_dir)
            .env(PROXY_ENV, self.proxy.url())
            .env(CONFIG_PATH_ENV, self.project_dir.join("no-such-config.toml"))
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }
}
