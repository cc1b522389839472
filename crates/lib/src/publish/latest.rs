//! The per-architecture `latest` pointer.
//!
//! `latest` is a relative symlink to a sibling date directory. It is swapped
//! by renaming a freshly created link over the old one, so a concurrent
//! reader sees either the previous snapshot or the new one, never a gap.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use crate::consts::DATE_FORMAT;

use super::fs::symlink_atomic;
use super::types::PublishError;

/// Repoint `latest` to `date`.
pub fn update(latest: &Path, date: NaiveDate) -> Result<(), PublishError> {
  let target = PathBuf::from(date.format(DATE_FORMAT).to_string());
  symlink_atomic(&target, latest).map_err(|source| PublishError::UpdateLatest {
    path: latest.to_path_buf(),
    source,
  })?;

  debug!(latest = %latest.display(), target = %target.display(), "latest pointer updated");
  Ok(())
}

/// The date `latest` points to, or `None` if nothing was published yet.
pub fn read(latest: &Path) -> Result<Option<NaiveDate>, PublishError> {
  let target = match std::fs::read_link(latest) {
    Ok(target) => target,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(source) => {
      return Err(PublishError::Inspect {
        path: latest.to_path_buf(),
        source,
      });
    }
  };

  Ok(
    target
      .file_name()
      .and_then(|n| n.to_str())
      .and_then(|n| NaiveDate::parse_from_str(n, DATE_FORMAT).ok()),
  )
}
