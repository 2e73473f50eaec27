//! Completion markers.
//!
//! A marker is an empty file `<dir>/.<op>_ok` (or `<dir>/.<op>_<extra>_ok`)
//! whose presence means the operation already succeeded. Markers are the only
//! state carried from one run to the next.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use crate::consts::MARKER_SUFFIX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
  path: PathBuf,
}

impl Marker {
  pub fn new(dir: &Path, op: &str) -> Self {
    Self {
      path: dir.join(format!(".{op}{MARKER_SUFFIX}")),
    }
  }

  /// Marker distinguished by an extra key, for operations sharing a directory.
  pub fn with_extra(dir: &Path, op: &str, extra: &str) -> Self {
    Self {
      path: dir.join(format!(".{op}_{extra}{MARKER_SUFFIX}")),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.path.is_file()
  }

  /// Create the marker and any missing parent directory.
  pub fn set(&self) -> io::Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&self.path, b"")
  }

  pub fn clear(&self) -> io::Result<()> {
    match std::fs::remove_file(&self.path) {
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      other => other,
    }
  }
}

/// Whether a file name looks like a marker.
pub fn is_marker(name: &OsStr) -> bool {
  name
    .to_str()
    .is_some_and(|n| n.starts_with('.') && n.ends_with(MARKER_SUFFIX) && n.len() > MARKER_SUFFIX.len() + 1)
}
