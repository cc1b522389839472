//! Single-active-run lock.
//!
//! A run holds an exclusive `flock` on `<work_dir>/.netbuild.lock` for its
//! whole lifetime. A second invocation that finds the lock taken gets
//! [`RunLockError::Contention`] naming the holder, and is expected to skip.
//! The lock is released when the [`RunLock`] is dropped or the process dies.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rustix::fs::{FlockOperation, flock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::RUN_LOCK_FILENAME;

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: i64,
  pub command: String,
  pub work_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum RunLockError {
  #[error(
    "another run is active: {command} (PID {pid}, started {started_at})\n\
     If no netbuild process is running, remove the lock file:\n  {lock_path}"
  )]
  Contention {
    command: String,
    pid: u32,
    started_at: String,
    lock_path: PathBuf,
  },

  #[error(
    "another run is active (could not read lock metadata)\n\
     If no netbuild process is running, remove the lock file:\n  {lock_path}"
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to create work directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to open lock file {path}: {source}")]
  OpenFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

impl RunLockError {
  /// Another run holds the lock.
  pub fn is_contention(&self) -> bool {
    matches!(
      self,
      RunLockError::Contention { .. } | RunLockError::ContentionUnknown { .. }
    )
  }
}

#[derive(Debug)]
pub struct RunLock {
  file: File,
  lock_path: PathBuf,
}

impl RunLock {
  /// Take the run lock in `work_dir` without waiting.
  pub fn acquire(work_dir: &Path, command: &str) -> Result<Self, RunLockError> {
    let lock_path = work_dir.join(RUN_LOCK_FILENAME);

    if !work_dir.exists() {
      std::fs::create_dir_all(work_dir).map_err(|source| RunLockError::CreateDir {
        path: work_dir.to_path_buf(),
        source,
      })?;
    }

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(|source| RunLockError::OpenFile {
        path: lock_path.clone(),
        source,
      })?;

    if let Err(err) = try_lock(&file) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(Self::read_contention_error(&lock_path));
      }
      return Err(RunLockError::LockFailed(err));
    }

    Self::write_metadata(&file, command, work_dir)?;
    debug!(path = %lock_path.display(), "acquired run lock");

    Ok(RunLock { file, lock_path })
  }

  /// Metadata of the held lock, read back through the held handle.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  fn write_metadata(file: &File, command: &str, work_dir: &Path) -> Result<(), RunLockError> {
    let metadata = LockMetadata {
      version: 1,
      pid: std::process::id(),
      started_at_unix: Utc::now().timestamp(),
      command: command.to_string(),
      work_dir: work_dir.to_path_buf(),
    };

    file.set_len(0).map_err(RunLockError::WriteMetadata)?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|e| RunLockError::WriteMetadata(io::Error::other(e)))?;
    writer.flush().map_err(RunLockError::WriteMetadata)?;

    Ok(())
  }

  fn read_contention_error(lock_path: &Path) -> RunLockError {
    if let Ok(contents) = std::fs::read_to_string(lock_path)
      && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
    {
      let started_at = DateTime::<Utc>::from_timestamp(metadata.started_at_unix, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| format!("Unix timestamp {}", metadata.started_at_unix));

      return RunLockError::Contention {
        command: metadata.command,
        pid: metadata.pid,
        started_at,
        lock_path: lock_path.to_path_buf(),
      };
    }

    RunLockError::ContentionUnknown {
      lock_path: lock_path.to_path_buf(),
    }
  }
}

fn try_lock(file: &File) -> io::Result<()> {
  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
    .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}
