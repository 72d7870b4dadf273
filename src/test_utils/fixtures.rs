//! On-disk fixtures: a `file://` module proxy and manifests.

use anyhow::{Context, Result};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

use crate::constants::MANIFEST_FILE_NAME;
use crate::fetch::dirhash;
use crate::fetch::module_proxy::escape_path;

/// A directory laid out like a Go module proxy, served through `file://`.
pub struct ModuleProxyFixture {
    root: PathBuf,
}

impl ModuleProxyFixture {
    /// Proxy rooted at `root` (created on first publish).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// `file://` URL to use as the module proxy.
    pub fn url(&self) -> String {
        format!("file://{}", self.root.display())
    }

    /// Publish `importpath@version` with `files` (module-relative path, content).
    ///
    /// Returns the `h1:` checksum of the published zip.
    pub fn publish(&self, importpath: &str, version: &str, files: &[(&str, &str)]) -> Result<String> {
        let prefix = format!("{importpath}@{version}/");
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (rel, content) in files {
            writer.start_file(format!("{prefix}{rel}"), SimpleFileOptions::default())?;
            writer.write_all(content.as_bytes())?;
        }
        let bytes = writer.finish()?.into_inner();

        let members: Vec<(String, &[u8])> =
            files.iter().map(|(rel, content)| (format!("{prefix}{rel}"), content.as_bytes())).collect();
        let sum = dirhash::hash_files(members.iter().map(|(n, c)| (n.as_str(), *c)))
            .map_err(anyhow::Error::msg)?;

        let dir = self.root.join(escape_path(importpath)).join("@v");
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        std::fs::write(dir.join(format!("{}.zip", escape_path(version))), bytes)?;
        Ok(sum)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Writes `extrepo.toml` files.
pub struct ManifestFixture;

impl ManifestFixture {
    /// Write `content` as the manifest in `dir`; returns its path.
    pub fn write(dir: &Path, content: &str) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE_NAME);
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}
