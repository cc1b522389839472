//! Replace-in-place file operations for the published tree.
//!
//! Every entry is first written to a hidden sibling and then renamed over its
//! final name. `rename` replaces a symlink itself rather than the file it
//! points to, so re-publishing over yesterday's link never writes into
//! yesterday's bytes, and readers only ever see a complete entry.

use std::fs::{self, File};
use std::io::{self, Write};
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

/// Hidden temporary sibling of `path` (`.<name>.tmp`).
fn tmp_sibling(path: &Path) -> PathBuf {
  let name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  path.with_file_name(format!(".{}.tmp", name))
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}

/// Write `data` to `dest` atomically, syncing before the rename.
pub fn write_atomic(dest: &Path, data: &[u8]) -> io::Result<()> {
  let tmp = tmp_sibling(dest);
  remove_if_exists(&tmp)?;

  let mut file = File::create(&tmp)?;
  file.write_all(data)?;
  file.sync_all()?;
  drop(file);

  fs::rename(&tmp, dest)
}

/// Copy the bytes of `src` (symlinks followed) to `dest` atomically.
pub fn copy_atomic(src: &Path, dest: &Path) -> io::Result<()> {
  let tmp = tmp_sibling(dest);
  remove_if_exists(&tmp)?;

  let mut reader = File::open(src)?;
  let mut file = File::create(&tmp)?;
  io::copy(&mut reader, &mut file)?;
  file.sync_all()?;
  drop(file);

  fs::rename(&tmp, dest)
}

/// Point `link` at `target`, replacing whatever `link` was before.
pub fn symlink_atomic(target: &Path, link: &Path) -> io::Result<()> {
  let tmp = tmp_sibling(link);
  remove_if_exists(&tmp)?;

  symlink(target, &tmp)?;
  fs::rename(&tmp, link)
}
