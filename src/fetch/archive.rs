//! Archive pins: a list of mirrors plus the SHA-256 of the archive bytes.

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use zip::ZipArchive;

use super::{Downloader, mismatch, unavailable};
use crate::core::RepoError;
use crate::declaration::DependencyDeclaration;
use crate::utils::fs::sanitize_rel_path;

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.zip`
    Zip,
    /// `.tar.gz` / `.tgz`
    TarGz,
    /// `.tar`
    Tar,
}

impl ArchiveFormat {
    /// Detect from the URL suffix, falling back to magic bytes.
    #[must_use]
    pub fn detect(url: &str, bytes: &[u8]) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.ends_with(".zip") {
            Some(Self::Zip)
        } else if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if path.ends_with(".tar") {
            Some(Self::Tar)
        } else if bytes.starts_with(b"PK\x03\x04") {
            Some(Self::Zip)
        } else if bytes.starts_with(&[0x1f, 0x8b]) {
            Some(Self::TarGz)
        } else if bytes.len() > 262 && &bytes[257..262] == b"ustar" {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Download from the first reachable mirror, verify, and extract into `dest`.
///
/// Mirrors are tried in order and only an unreachable mirror moves on to the
/// next one; a checksum mismatch stops immediately.
pub async fn fetch_archive(
    downloader: &Downloader,
    decl: &DependencyDeclaration,
    urls: &[String],
    sha256: &str,
    strip_prefix: Option<&str>,
    dest: &Path,
) -> Result<(), RepoError> {
    let mut failures = Vec::new();
    let mut fetched = None;
    for url in urls {
        match downloader.get(url).await {
            Ok(bytes) => {
                fetched = Some((url.clone(), bytes));
                break;
            }
            Err(reason) => {
                tracing::warn!(target: "fetch", "({}) Mirror failed: {}", decl.name, reason);
                failures.push(reason);
            }
        }
    }
    let Some((url, bytes)) = fetched else {
        return Err(unavailable(decl, failures.join("; ")));
    };

    let actual = hex::encode(Sha256::digest(&bytes));
    if actual != sha256 {
        return Err(mismatch(decl, sha256, actual));
    }

    let format = ArchiveFormat::detect(&url, &bytes)
        .ok_or_else(|| unavailable(decl, format!("{url}: unrecognized archive format")))?;

    let decl_owned = decl.clone();
    let strip = strip_prefix.map(PathBuf::from);
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || {
        unpack(format, &bytes, strip.as_deref(), &dest)
            .map_err(|e| unavailable(&decl_owned, format!("{url}: {e:#}")))
    })
    .await
    .map_err(|e| RepoError::other(format!("Archive extraction task failed: {e}")))?
}

/// Extract `bytes` into `dest`, keeping only members under `strip_prefix`.
pub fn unpack(
    format: ArchiveFormat,
    bytes: &[u8],
    strip_prefix: Option<&Path>,
    dest: &Path,
) -> anyhow::Result<()> {
    match format {
        ArchiveFormat::Zip => unpack_zip(bytes, strip_prefix, dest),
        ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(Cursor::new(bytes)), strip_prefix, dest),
        ArchiveFormat::Tar => unpack_tar(Cursor::new(bytes), strip_prefix, dest),
    }
}

/// Member path relative to `dest`, or `None` when it lies outside the prefix.
fn member_target(name: &Path, strip_prefix: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    let rel = sanitize_rel_path(name)?;
    let rel = match strip_prefix {
        Some(prefix) => match rel.strip_prefix(prefix) {
            Ok(stripped) => stripped.to_path_buf(),
            Err(_) => return Ok(None),
        },
        None => rel,
    };
    Ok(if rel.as_os_str().is_empty() { None } else { Some(rel) })
}

fn unpack_tar<R: Read>(reader: R, strip_prefix: Option<&Path>, dest: &Path) -> anyhow::Result<()> {
    let mut archive = Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_path_buf();
        let Some(rel) = member_target(&name, strip_prefix)? else {
            continue;
        };
        ensure_no_link_ancestor(dest, &rel)?;
        let out_path = dest.join(&rel);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let kind = entry.header().entry_type();
        if kind.is_symlink() || kind.is_hard_link() {
            let target = entry
                .link_name()?
                .ok_or_else(|| anyhow::anyhow!("link {} has no target", name.display()))?
                .into_owned();
            if kind.is_hard_link() {
                // Hard link targets are archive member names, not paths relative to the link.
                let target_rel = member_target(&target, strip_prefix)?.ok_or_else(|| {
                    anyhow::anyhow!(
                        "hard link {} points outside the extracted tree: {}",
                        name.display(),
                        target.display()
                    )
                })?;
                ensure_no_link_ancestor(dest, &target_rel)?;
                fs::hard_link(dest.join(target_rel), &out_path)?;
                continue;
            }
            if !link_stays_inside(&rel, &target) {
                anyhow::bail!(
                    "symbolic link {} points outside the extracted tree: {}",
                    name.display(),
                    target.display()
                );
            }
        }
        entry.unpack(&out_path)?;
    }
    Ok(())
}

/// Fail when any existing component of `dest/rel` is a symbolic link.
fn ensure_no_link_ancestor(dest: &Path, rel: &Path) -> anyhow::Result<()> {
    let mut current = dest.to_path_buf();
    for component in rel.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => anyhow::bail!(
                "archive member {} would be written through symbolic link {}",
                rel.display(),
                current.display()
            ),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Whether a symlink at `rel` with relative `target` resolves inside the tree.
fn link_stays_inside(rel: &Path, target: &Path) -> bool {
    let mut depth = rel.components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

fn unpack_zip(bytes: &[u8], strip_prefix: Option<&Path>, dest: &Path) -> anyhow::Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = PathBuf::from(file.name());
        let Some(rel) = member_target(&name, strip_prefix)? else {
            continue;
        };
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

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode | 0o200))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(ArchiveFormat::detect("https://x/a.zip", b""), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect("https://x/a.tgz?raw=1", b""), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect("https://x/a.tar", b""), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::detect("https://x/a", &[0x1f, 0x8b, 0]), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect("https://x/a", b"plain"), None);
    }

    #[test]
    fn test_unpack_tar_gz_with_strip_prefix() {
        let temp = TempDir::new().unwrap();
        let bytes = tar_gz(&[
            ("log-1.1.0/log.go", "package log\n"),
            ("log-1.1.0/handlers/cli/cli.go", "package cli\n"),
            ("README", "outside prefix\n"),
        ]);
        unpack(ArchiveFormat::TarGz, &bytes, Some(Path::new("log-1.1.0")), temp.path()).unwrap();
        assert!(temp.path().join("log.go").is_file());
        assert!(temp.path().join("handlers/cli/cli.go").is_file());
        assert!(!temp.path().join("README").exists());
    }

    #[test]
    fn test_unpack_zip_without_prefix() {
        let temp = TempDir::new().unwrap();
        let bytes = zip_bytes(&[("a/b.go", "package a\n")]);
        unpack(ArchiveFormat::Zip, &bytes, None, temp.path()).unwrap();
        assert_eq!(std::fs::read_to_string(temp.path().join("a/b.go")).unwrap(), "package a\n");
    }

    fn tar_with_link(link: &str, target: &str, then: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        builder.append_link(&mut header, link, target).unwrap();

        let body = b"escaped\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, then, &body[..]).unwrap();
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_unpack_tar_keeps_links_inside_the_tree() {
        let outside = TempDir::new().unwrap();

        let temp = TempDir::new().unwrap();
        let bytes = tar_with_link("pkg/evil", outside.path().to_str().unwrap(), "pkg/evil/escaped.txt");
        assert!(unpack(ArchiveFormat::Tar, &bytes, None, temp.path()).is_err());
        assert!(!outside.path().join("escaped.txt").exists());

        let temp = TempDir::new().unwrap();
        let bytes = tar_with_link("pkg/evil", "../../..", "pkg/evil/escaped.txt");
        assert!(unpack(ArchiveFormat::Tar, &bytes, None, temp.path()).is_err());

        // A link that stays inside is extracted, but nothing is written through it.
        let temp = TempDir::new().unwrap();
        let bytes = tar_with_link("pkg/alias", "../src", "pkg/alias/escaped.txt");
        assert!(unpack(ArchiveFormat::Tar, &bytes, None, temp.path()).is_err());
        assert!(
            std::fs::symlink_metadata(temp.path().join("pkg/alias"))
                .unwrap()
                .file_type()
                .is_symlink()
        );
        assert!(!temp.path().join("src/escaped.txt").exists());
    }

    #[test]
    fn test_link_containment() {
        assert!(link_stays_inside(Path::new("a/b/link"), Path::new("../c")));
        assert!(link_stays_inside(Path::new("a/link"), Path::new("../c.go")));
        assert!(!link_stays_inside(Path::new("a/link"), Path::new("../../c.go")));
        assert!(!link_stays_inside(Path::new("link"), Path::new("/etc/passwd")));
        assert!(link_stays_inside(Path::new("link"), Path::new("./x/../y")));
    }

    #[test]
    fn test_unpack_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let bytes = zip_bytes(&[("../evil.go", "package evil\n")]);
        assert!(unpack(ArchiveFormat::Zip, &bytes, None, temp.path()).is_err());
    }
}
