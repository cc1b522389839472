use std::io;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::util::hash::{ContentHash, HashError};

/// The three files every netboot snapshot contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
  Kernel,
  Initrd,
  Ipxe,
}

impl ArtifactKind {
  /// Manifest order.
  pub const ALL: [ArtifactKind; 3] = [ArtifactKind::Kernel, ArtifactKind::Initrd, ArtifactKind::Ipxe];

  /// Entry name inside the build tool's output directory.
  pub fn source_name(self) -> &'static str {
    match self {
      ArtifactKind::Kernel => "bzImage",
      ArtifactKind::Initrd => "initrd",
      ArtifactKind::Ipxe => "netboot.ipxe",
    }
  }

  /// File name inside a published snapshot.
  pub fn published_name(self) -> &'static str {
    match self {
      ArtifactKind::Kernel => "vmlinuz",
      ArtifactKind::Initrd => "initrd",
      ArtifactKind::Ipxe => "netboot.ipxe",
    }
  }
}

/// A build output file about to be published. Only lives for one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
  pub kind: ArtifactKind,
  /// Real location after following the build tool's links.
  pub source: PathBuf,
  pub digest: ContentHash,
}

impl Artifact {
  pub fn name(&self) -> &'static str {
    self.kind.published_name()
  }
}

/// How an artifact ended up in today's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "placement", rename_all = "snake_case")]
pub enum Placement {
  /// New bytes were written.
  Copied,
  /// Unchanged since yesterday; a relative symlink into an older snapshot.
  Linked { target: PathBuf },
}

impl Placement {
  pub fn is_link(&self) -> bool {
    matches!(self, Placement::Linked { .. })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedFile {
  pub name: String,
  pub digest: ContentHash,
  #[serde(flatten)]
  pub placement: Placement,
}

/// A dated snapshot directory for one architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedSnapshot {
  pub arch: String,
  pub date: NaiveDate,
  pub dir: PathBuf,
  /// In manifest order.
  pub files: Vec<PublishedFile>,
}

impl PublishedSnapshot {
  pub fn linked_count(&self) -> usize {
    self.files.iter().filter(|f| f.placement.is_link()).count()
  }

  pub fn copied_count(&self) -> usize {
    self.files.len() - self.linked_count()
  }
}

/// Snapshot dates on disk for one architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotListing {
  pub arch: String,
  /// Oldest first.
  pub dates: Vec<NaiveDate>,
  pub latest: Option<NaiveDate>,
}

#[derive(Debug, Error)]
pub enum PublishError {
  #[error("cannot resolve {name} in build output for {arch} at {path}: {source}")]
  ResolveArtifact {
    arch: String,
    name: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("failed to create snapshot directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to inspect {path}: {source}")]
  Inspect {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to copy {from} to {to}: {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to link {link} -> {target}: {source}")]
  Link {
    link: PathBuf,
    target: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write manifest {path}: {source}")]
  WriteManifest {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read manifest {path}: {source}")]
  ReadManifest {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("malformed manifest {path} at line {line}: {content:?}")]
  ParseManifest {
    path: PathBuf,
    line: usize,
    content: String,
  },

  #[error("failed to update latest pointer {path}: {source}")]
  UpdateLatest {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("no snapshot for {arch} on {date}")]
  SnapshotNotFound { arch: String, date: String },

  /// Snapshots after `date` may link into it, so it is never rewritten.
  #[error("refusing to publish {arch} for {date}: a newer snapshot from {newest} already exists")]
  OlderThanPublished {
    arch: String,
    date: NaiveDate,
    newest: NaiveDate,
  },
}
