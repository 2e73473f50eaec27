//! Filesystem actions: directory reset and tree copy.

use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::execute::marker::is_marker;
use crate::execute::types::StepError;

/// Empty `dir`, keeping completion markers. Creates it when missing.
pub fn reset_dir(dir: &Path) -> Result<(), StepError> {
  if !dir.exists() {
    return fs::create_dir_all(dir).map_err(|e| StepError::io(dir, e));
  }
  debug!(dir = %dir.display(), "resetting directory");
  for entry in fs::read_dir(dir).map_err(|e| StepError::io(dir, e))? {
    let entry = entry.map_err(|e| StepError::io(dir, e))?;
    if is_marker(&entry.file_name()) {
      continue;
    }
    let path = entry.path();
    let file_type = entry.file_type().map_err(|e| StepError::io(&path, e))?;
    let removed = if file_type.is_dir() {
      fs::remove_dir_all(&path)
    } else {
      fs::remove_file(&path)
    };
    removed.map_err(|e| StepError::io(&path, e))?;
  }
  Ok(())
}

/// Copy the content of `from` into `to`, merging with what is there.
///
/// Symbolic links are recreated, not followed. Markers are not copied.
pub fn copy_tree(from: &Path, to: &Path) -> Result<(), StepError> {
  debug!(from = %from.display(), to = %to.display(), "copying tree");
  fs::create_dir_all(to).map_err(|e| StepError::io(to, e))?;

  for entry in WalkDir::new(from).min_depth(1).follow_links(false) {
    let entry = entry.map_err(|e| {
      let path = e.path().unwrap_or(from).to_path_buf();
      StepError::io(path, e.into())
    })?;
    if is_marker(entry.file_name()) {
      continue;
    }
    let Ok(relative) = entry.path().strip_prefix(from) else {
      continue;
    };
    let target = to.join(relative);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      fs::create_dir_all(&target).map_err(|e| StepError::io(&target, e))?;
    } else if file_type.is_symlink() {
      copy_symlink(entry.path(), &target)?;
    } else {
      fs::copy(entry.path(), &target).map_err(|e| StepError::io(&target, e))?;
    }
  }
  Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<(), StepError> {
  let points_to = fs::read_link(link).map_err(|e| StepError::io(link, e))?;
  if target.symlink_metadata().is_ok() {
    fs::remove_file(target).map_err(|e| StepError::io(target, e))?;
  }
  std::os::unix::fs::symlink(points_to, target).map_err(|e| StepError::io(target, e))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<(), StepError> {
  fs::copy(link, target)
    .map(|_| ())
    .map_err(|e| StepError::io(target, e))
}
