//! Snapshot verification against its manifest.

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::consts::MANIFEST_FILENAME;
use crate::util::hash::{ContentHash, hash_file};

use super::manifest;
use super::types::{ArtifactKind, PublishError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyStatus {
  Ok,
  Mismatch { actual: ContentHash },
  Missing,
  Unreadable { message: String },
  /// A required artifact has no manifest line.
  Unlisted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyEntry {
  pub name: String,
  pub expected: Option<ContentHash>,
  #[serde(flatten)]
  pub status: VerifyStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
  pub arch: String,
  pub date: NaiveDate,
  pub entries: Vec<VerifyEntry>,
}

impl VerifyReport {
  pub fn is_ok(&self) -> bool {
    self.entries.iter().all(|e| e.status == VerifyStatus::Ok)
  }

  pub fn failures(&self) -> impl Iterator<Item = &VerifyEntry> {
    self.entries.iter().filter(|e| e.status != VerifyStatus::Ok)
  }
}

/// Re-hash every file listed in `dir`'s manifest, the way
/// `sha256sum -c` would, and flag required artifacts the manifest omits.
pub fn verify_snapshot(arch: &str, date: NaiveDate, dir: &Path) -> Result<VerifyReport, PublishError> {
  let entries = manifest::read(&dir.join(MANIFEST_FILENAME))?;
  let mut results = Vec::with_capacity(entries.len());

  for entry in &entries {
    let status = match hash_file(&dir.join(&entry.name)) {
      Ok(actual) if actual == entry.digest => VerifyStatus::Ok,
      Ok(actual) => VerifyStatus::Mismatch { actual },
      Err(e) if e.is_not_found() => VerifyStatus::Missing,
      Err(e) => VerifyStatus::Unreadable { message: e.to_string() },
    };
    results.push(VerifyEntry {
      name: entry.name.clone(),
      expected: Some(entry.digest.clone()),
      status,
    });
  }

  for kind in ArtifactKind::ALL {
    if !entries.iter().any(|e| e.name == kind.published_name()) {
      results.push(VerifyEntry {
        name: kind.published_name().to_string(),
        expected: None,
        status: VerifyStatus::Unlisted,
      });
    }
  }

  Ok(VerifyReport {
    arch: arch.to_string(),
    date,
    entries: results,
  })
}
