//! Module proxy downloads (`{proxy}/{module}/@v/{version}.zip`).

use std::fs::{self, File};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

use super::{Downloader, dirhash, mismatch, unavailable};
use crate::core::RepoError;
use crate::declaration::DependencyDeclaration;
use crate::utils::fs::sanitize_rel_path;

/// Escape a module path or version for proxy URLs: every uppercase letter
/// becomes `!` followed by its lowercase form.
#[must_use]
pub fn escape_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// URL of a module zip on `proxy`.
#[must_use]
pub fn module_zip_url(proxy: &str, importpath: &str, version: &str) -> String {
    format!(
        "{}/{}/@v/{}.zip",
        proxy.trim_end_matches('/'),
        escape_path(importpath),
        escape_path(version)
    )
}

/// Download, verify, and extract a module version into `dest`.
pub async fn fetch_module(
    downloader: &Downloader,
    proxy: &str,
    decl: &DependencyDeclaration,
    version: &str,
    sum: &str,
    dest: &Path,
) -> Result<(), RepoError> {
    let url = module_zip_url(proxy, &decl.importpath, version);
    tracing::debug!(target: "fetch", "({}) GET {}", decl.name, url);
    let bytes = downloader.get(&url).await.map_err(|reason| unavailable(decl, reason))?;

    let decl_owned = decl.clone();
    let version = version.to_string();
    let sum = sum.to_string();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| unavailable(&decl_owned, format!("invalid module zip: {e}")))?;

        let actual = dirhash::hash_zip(&mut archive)
            .map_err(|e| unavailable(&decl_owned, format!("invalid module zip: {e}")))?;
        if actual != sum {
            return Err(mismatch(&decl_owned, sum, actual));
        }
        tracing::debug!(target: "fetch", "({}) Verified {}", decl_owned.name, actual);

        let prefix = format!("{}@{}/", decl_owned.importpath, version);
        extract_module_zip(&mut archive, &prefix, &dest)
            .map_err(|e| unavailable(&decl_owned, format!("invalid module zip: {e}")))
    })
    .await
    .map_err(|e| RepoError::other(format!("Module extraction task failed: {e}")))?
}

/// Extract members under `prefix` into `dest`, dropping the prefix.
fn extract_module_zip<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    prefix: &str,
    dest: &Path,
) -> anyhow::Result<()> {
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();
        let Some(rest) = name.strip_prefix(prefix) else {
            anyhow::bail!("member '{name}' is outside '{prefix}'");
        };
        let rel = sanitize_rel_path(Path::new(rest))?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let out_path = dest.join(rel);
        if file.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        std::io::copy(&mut file, &mut out)?;
    }
    Ok(())
}
