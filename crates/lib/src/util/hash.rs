//! Content hashing for published artifacts.
//!
//! Artifacts are compared across days by the SHA-256 of their bytes. The
//! digest is also what ends up in each snapshot's `sha256sum.txt`.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A full 64-character SHA-256 digest of a file's content.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters), the same
/// representation `sha256sum` prints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A file could not be opened or read while hashing.
#[derive(Debug, Error)]
#[error("failed to hash {path}: {source}")]
pub struct HashError {
  pub path: PathBuf,
  #[source]
  pub source: io::Error,
}

impl HashError {
  /// True when the file simply does not exist.
  pub fn is_not_found(&self) -> bool {
    self.source.kind() == io::ErrorKind::NotFound
  }
}

/// Hash a file's contents.
///
/// The file is streamed through the hasher in fixed-size chunks, so large
/// initrd images are never held in memory. Symlinks are followed.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let to_err = |source: io::Error| HashError {
    path: path.to_path_buf(),
    source,
  };

  let mut file = fs::File::open(path).map_err(to_err)?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = match file.read(&mut buffer) {
      Ok(n) => n,
      Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
      Err(e) => return Err(to_err(e)),
    };
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}
