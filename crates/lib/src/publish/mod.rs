//! The public snapshot tree.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<arch>/<YYYY-MM-DD>/vmlinuz
//! <root>/<arch>/<YYYY-MM-DD>/initrd
//! <root>/<arch>/<YYYY-MM-DD>/netboot.ipxe
//! <root>/<arch>/<YYYY-MM-DD>/sha256sum.txt
//! <root>/<arch>/latest -> <YYYY-MM-DD>
//! ```
//!
//! An artifact whose bytes match yesterday's copy is published as a relative
//! symlink into the older snapshot instead of a second copy. Links always
//! point at the snapshot that holds the real bytes, so a file unchanged for
//! months is still one hop away.
//!
//! # Submodules
//!
//! - [`latest`] - The per-architecture `latest` pointer
//! - [`manifest`] - `sha256sum.txt` rendering and parsing
//! - [`verify`] - Re-hashing a snapshot against its manifest

mod fs;
pub mod latest;
pub mod manifest;
mod types;
pub mod verify;

pub use types::*;

use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::consts::{DATE_FORMAT, LATEST_LINK, MANIFEST_FILENAME};
use crate::util::hash::hash_file;
use manifest::ManifestEntry;
use verify::{VerifyReport, verify_snapshot};

fn date_dir_name(date: NaiveDate) -> String {
  date.format(DATE_FORMAT).to_string()
}

/// Owns the published tree rooted at `root`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
  root: PathBuf,
}

impl ArtifactStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn arch_dir(&self, arch: &str) -> PathBuf {
    self.root.join(arch)
  }

  pub fn snapshot_dir(&self, arch: &str, date: NaiveDate) -> PathBuf {
    self.arch_dir(arch).join(date_dir_name(date))
  }

  pub fn latest_link(&self, arch: &str) -> PathBuf {
    self.arch_dir(arch).join(LATEST_LINK)
  }

  /// Where `latest` currently points for `arch`.
  pub fn latest(&self, arch: &str) -> Result<Option<NaiveDate>, PublishError> {
    latest::read(&self.latest_link(arch))
  }

  /// Publish the artifacts in `output_dir` as `arch`'s snapshot for `today`.
  ///
  /// Safe to repeat for the same day: entries are replaced in place and the
  /// copy/link decisions come out the same for the same inputs. A failure
  /// leaves whatever was already written in today's directory and does not
  /// move `latest`.
  ///
  /// Dates older than the newest snapshot or `latest` are refused: later
  /// snapshots may link into them, and `latest` never moves backwards.
  pub fn publish(&self, arch: &str, output_dir: &Path, today: NaiveDate) -> Result<PublishedSnapshot, PublishError> {
    let artifacts = resolve_artifacts(arch, output_dir)?;

    if let Some(newest) = self.newest_snapshot(arch)?
      && newest > today
    {
      return Err(PublishError::OlderThanPublished {
        arch: arch.to_string(),
        date: today,
        newest,
      });
    }

    let today_dir = self.snapshot_dir(arch, today);
    std::fs::create_dir_all(&today_dir).map_err(|source| PublishError::CreateDir {
      path: today_dir.clone(),
      source,
    })?;

    let yesterday = self.previous_snapshot(arch, today)?;
    if yesterday.is_none() {
      debug!(arch, date = %today, "no snapshot for the previous day, copying all artifacts");
    }

    let mut files = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
      let dest = today_dir.join(artifact.name());
      let placement = match &yesterday {
        Some((date, dir)) => self.place_against(artifact, &dest, *date, dir)?,
        None => {
          copy_artifact(artifact, &dest)?;
          Placement::Copied
        }
      };

      debug!(arch, name = artifact.name(), digest = %artifact.digest, placement = ?placement, "placed artifact");
      files.push(PublishedFile {
        name: artifact.name().to_string(),
        digest: artifact.digest.clone(),
        placement,
      });
    }

    let entries: Vec<ManifestEntry> = artifacts
      .iter()
      .map(|a| ManifestEntry {
        name: a.name().to_string(),
        digest: a.digest.clone(),
      })
      .collect();
    manifest::write(&today_dir.join(MANIFEST_FILENAME), &entries)?;

    latest::update(&self.latest_link(arch), today)?;

    let snapshot = PublishedSnapshot {
      arch: arch.to_string(),
      date: today,
      dir: today_dir,
      files,
    };

    info!(
      arch,
      date = %today,
      copied = snapshot.copied_count(),
      linked = snapshot.linked_count(),
      "published snapshot"
    );
    Ok(snapshot)
  }

  /// The newest date among `arch`'s snapshot directories and its `latest` pointer.
  fn newest_snapshot(&self, arch: &str) -> Result<Option<NaiveDate>, PublishError> {
    let listing = self.list_snapshots(arch)?;
    Ok(listing.dates.last().copied().max(listing.latest))
  }

  /// The snapshot directory for the day before `today`, if one exists.
  fn previous_snapshot(&self, arch: &str, today: NaiveDate) -> Result<Option<(NaiveDate, PathBuf)>, PublishError> {
    let Some(date) = today.pred_opt() else {
      return Ok(None);
    };
    let dir = self.snapshot_dir(arch, date);

    match std::fs::metadata(&dir) {
      Ok(meta) if meta.is_dir() => Ok(Some((date, dir))),
      Ok(_) => Ok(None),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(source) => Err(PublishError::Inspect { path: dir, source }),
    }
  }

  /// Decide copy-or-link for one artifact given yesterday's snapshot.
  fn place_against(
    &self,
    artifact: &Artifact,
    dest: &Path,
    prev_date: NaiveDate,
    prev_dir: &Path,
  ) -> Result<Placement, PublishError> {
    let prev = prev_dir.join(artifact.name());

    let unchanged = match hash_file(&prev) {
      Ok(digest) => digest == artifact.digest,
      Err(e) if e.is_not_found() && !entry_exists(&prev)? => {
        debug!(path = %prev.display(), "previous snapshot lacks this artifact");
        false
      }
      Err(e) => return Err(e.into()),
    };

    if !unchanged {
      copy_artifact(artifact, dest)?;
      return Ok(Placement::Copied);
    }

    let target = link_target(&prev, prev_date, artifact.name())?;
    fs::symlink_atomic(&target, dest).map_err(|source| PublishError::Link {
      link: dest.to_path_buf(),
      target: target.clone(),
      source,
    })?;
    Ok(Placement::Linked { target })
  }

  /// Dated snapshot directories for `arch`, oldest first.
  pub fn list_snapshots(&self, arch: &str) -> Result<SnapshotListing, PublishError> {
    let arch_dir = self.arch_dir(arch);
    let mut dates = Vec::new();

    let read_dir = match std::fs::read_dir(&arch_dir) {
      Ok(rd) => Some(rd),
      Err(e) if e.kind() == io::ErrorKind::NotFound => None,
      Err(source) => return Err(PublishError::Inspect { path: arch_dir, source }),
    };

    for entry in read_dir.into_iter().flatten() {
      let entry = entry.map_err(|source| PublishError::Inspect {
        path: arch_dir.clone(),
        source,
      })?;
      let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
      if !is_dir {
        continue;
      }
      if let Some(date) = entry
        .file_name()
        .to_str()
        .and_then(|n| NaiveDate::parse_from_str(n, DATE_FORMAT).ok())
      {
        dates.push(date);
      }
    }
    dates.sort();

    Ok(SnapshotListing {
      arch: arch.to_string(),
      dates,
      latest: self.latest(arch)?,
    })
  }

  /// Check `arch`'s snapshot for `date` against its manifest.
  pub fn verify(&self, arch: &str, date: NaiveDate) -> Result<VerifyReport, PublishError> {
    let dir = self.snapshot_dir(arch, date);
    if !dir.is_dir() {
      return Err(PublishError::SnapshotNotFound {
        arch: arch.to_string(),
        date: date_dir_name(date),
      });
    }
    verify_snapshot(arch, date, &dir)
  }
}

/// Follow the build tool's links to the three artifacts and hash them.
fn resolve_artifacts(arch: &str, output_dir: &Path) -> Result<Vec<Artifact>, PublishError> {
  ArtifactKind::ALL
    .into_iter()
    .map(|kind| -> Result<Artifact, PublishError> {
      let path = output_dir.join(kind.source_name());
      let source = std::fs::canonicalize(&path).map_err(|source| PublishError::ResolveArtifact {
        arch: arch.to_string(),
        name: kind.source_name(),
        path: path.clone(),
        source,
      })?;
      let digest = hash_file(&source)?;
      Ok(Artifact { kind, source, digest })
    })
    .collect()
}

fn copy_artifact(artifact: &Artifact, dest: &Path) -> Result<(), PublishError> {
  fs::copy_atomic(&artifact.source, dest).map_err(|source| PublishError::Copy {
    from: artifact.source.clone(),
    to: dest.to_path_buf(),
    source,
  })
}

/// Whether a directory entry exists at `path` at all, dangling links included.
fn entry_exists(path: &Path) -> Result<bool, PublishError> {
  match std::fs::symlink_metadata(path) {
    Ok(_) => Ok(true),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(source) => Err(PublishError::Inspect {
      path: path.to_path_buf(),
      source,
    }),
  }
}

/// Relative link target for an artifact unchanged since `prev_date`.
///
/// If yesterday's entry is itself a dedup link into a sibling snapshot, its
/// target is reused so the link keeps pointing at the real bytes.
fn link_target(prev: &Path, prev_date: NaiveDate, name: &str) -> Result<PathBuf, PublishError> {
  let meta = std::fs::symlink_metadata(prev).map_err(|source| PublishError::Inspect {
    path: prev.to_path_buf(),
    source,
  })?;

  if meta.file_type().is_symlink() {
    let existing = std::fs::read_link(prev).map_err(|source| PublishError::Inspect {
      path: prev.to_path_buf(),
      source,
    })?;
    if is_sibling_snapshot_link(&existing) {
      return Ok(existing);
    }
  }

  Ok(Path::new("..").join(date_dir_name(prev_date)).join(name))
}

/// `../<date>/<name>`: resolves identically from any snapshot directory.
fn is_sibling_snapshot_link(target: &Path) -> bool {
  let parts: Vec<Component> = target.components().collect();
  match parts.as_slice() {
    [Component::ParentDir, Component::Normal(date), Component::Normal(_)] => date
      .to_str()
      .is_some_and(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).is_ok()),
    _ => false,
  }
}
