//! Go module `h1:` checksums.
//!
//! The hash is computed over the file set of a module zip:
//!
//! 1. sort the member names;
//! 2. for each member write `"{sha256(contents) as hex}  {name}\n"` into a summary;
//! 3. the checksum is `"h1:" + base64(sha256(summary))`.
//!
//! Directory entries are skipped.

use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::io::{Read, Seek};
use zip::ZipArchive;

/// Prefix of the only supported checksum format.
pub const H1_PREFIX: &str = "h1:";

/// Compute the `h1:` checksum of named file contents.
///
/// `files` need not be sorted. Names containing a newline are rejected because
/// they would make the summary ambiguous.
pub fn hash_files<'a, I>(files: I) -> Result<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut entries: Vec<(String, String)> = Vec::new();
    for (name, contents) in files {
        entries.push((checked_name(name)?, hex::encode(Sha256::digest(contents))));
    }
    Ok(summarize(entries))
}

/// Compute the `h1:` checksum of every file in a zip archive.
///
/// Members are streamed through the hasher one at a time.
pub fn hash_zip<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String, String> {
    let mut entries: Vec<(String, String)> = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| format!("invalid zip entry: {e}"))?;
        if file.is_dir() {
            continue;
        }
        let name = checked_name(file.name())?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher).map_err(|e| format!("cannot read {name}: {e}"))?;
        entries.push((name, hex::encode(hasher.finalize())));
    }
    Ok(summarize(entries))
}

fn checked_name(name: &str) -> Result<String, String> {
    if name.contains('\n') {
        return Err(format!("file name {name:?} contains a newline"));
    }
    Ok(name.to_string())
}

/// `entries` are (name, hex digest) pairs in any order.
fn summarize(mut entries: Vec<(String, String)>) -> String {
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let mut summary = Sha256::new();
    for (name, digest) in &entries {
        summary.update(format!("{digest}  {name}\n").as_bytes());
    }
    format!(
        "{H1_PREFIX}{}",
        base64::engine::general_purpose::STANDARD.encode(summary.finalize())
    )
}
