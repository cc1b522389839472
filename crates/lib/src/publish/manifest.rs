//! `sha256sum.txt` manifests.
//!
//! One line per artifact, `<digest> *<name>`, exactly what `sha256sum -b`
//! prints, so a downloaded snapshot can be checked with
//! `sha256sum -c sha256sum.txt`.

use std::path::Path;

use crate::util::hash::ContentHash;

use super::fs::write_atomic;
use super::types::PublishError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
  pub name: String,
  pub digest: ContentHash,
}

pub fn render(entries: &[ManifestEntry]) -> String {
  let mut out = String::new();
  for entry in entries {
    out.push_str(&entry.digest.0);
    out.push_str(" *");
    out.push_str(&entry.name);
    out.push('\n');
  }
  out
}

/// Parse manifest text. Accepts both binary (`<hex> *<name>`) and text
/// (`<hex>  <name>`) mode lines; blank lines are skipped.
pub fn parse(path: &Path, content: &str) -> Result<Vec<ManifestEntry>, PublishError> {
  let mut entries = Vec::new();

  for (idx, line) in content.lines().enumerate() {
    if line.trim().is_empty() {
      continue;
    }

    let malformed = || PublishError::ParseManifest {
      path: path.to_path_buf(),
      line: idx + 1,
      content: line.to_string(),
    };

    let (digest, rest) = line.split_once(' ').ok_or_else(malformed)?;
    let name = rest
      .strip_prefix('*')
      .or_else(|| rest.strip_prefix(' '))
      .ok_or_else(malformed)?;

    if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) || name.is_empty() {
      return Err(malformed());
    }

    entries.push(ManifestEntry {
      name: name.to_string(),
      digest: ContentHash(digest.to_ascii_lowercase()),
    });
  }

  Ok(entries)
}

pub fn write(path: &Path, entries: &[ManifestEntry]) -> Result<(), PublishError> {
  write_atomic(path, render(entries).as_bytes()).map_err(|source| PublishError::WriteManifest {
    path: path.to_path_buf(),
    source,
  })
}

pub fn read(path: &Path) -> Result<Vec<ManifestEntry>, PublishError> {
  let content = std::fs::read_to_string(path).map_err(|source| PublishError::ReadManifest {
    path: path.to_path_buf(),
    source,
  })?;
  parse(path, &content)
}
